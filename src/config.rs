//! Command-line and environment configuration.
//!
//! Every setting can be given as a flag or a `FORM_INTAKE_*` variable; the
//! flag wins.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Contact form submission service")]
pub struct AppConfig {
    /// Address to listen on
    #[arg(long, env = "FORM_INTAKE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "FORM_INTAKE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Where accepted attachments are written
    #[arg(long, env = "FORM_INTAKE_UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    /// Database image file, rewritten after every submission
    #[arg(long, env = "FORM_INTAKE_DATABASE_PATH", default_value = "./database.db")]
    pub database_path: PathBuf,

    /// Static files served at `/`
    #[arg(long, env = "FORM_INTAKE_PUBLIC_DIR", default_value = "./public")]
    pub public_dir: PathBuf,

    /// Initialize the database image and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
