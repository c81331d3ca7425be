pub mod chat_session;
pub mod data_dir_service;
pub mod diagnostic_logger;
pub mod emote_service;
pub mod kick_api_service;
pub mod link_aggregator;
pub mod link_storage_service;
pub mod message_parser;
pub mod pusher_service;
pub mod storage_backend;
pub mod url_canonicalizer;
pub mod url_extractor;
