pub mod record;
pub mod template;
pub mod simplify;
pub mod payload;
pub mod chunk;
pub mod selflog;
pub mod sink;
pub mod layer;

pub mod config;
pub mod env;
pub mod loggly;

pub mod init;
pub mod noop_sink;
