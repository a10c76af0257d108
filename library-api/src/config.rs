use clap::Parser;

/// Runtime settings, read from flags or the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "library-api", about = "REST API for book reviews and demo user tokens")]
pub struct Config {
    /// SQLite database location; the file is created if missing
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://library.db")]
    pub database_url: String,

    /// Address the HTTP server binds to
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8001")]
    pub http_addr: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}
