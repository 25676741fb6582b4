use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "napbook", about = "Napbook social client")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Backend endpoint used for file and avatar URLs
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Posts per feed page
    #[arg(long)]
    pub page_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Signout,
    /// Show the signed-in profile
    Whoami,
    /// Create a post with an image
    Post {
        #[arg(long)]
        caption: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        location: String,
        /// Comma separated
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Edit one of your posts
    EditPost {
        id: String,
        #[arg(long)]
        caption: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value = "")]
        tags: String,
        /// Replacement image
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete one of your posts
    DeletePost { id: String },
    /// Page through the feed
    Feed {
        #[arg(long, default_value = "1")]
        pages: usize,
    },
    /// Newest posts
    Recent,
    /// Show one post
    Show { id: String },
    /// Toggle your like on a post
    Like { id: String },
    /// Toggle saving a post
    Save { id: String },
    /// List your saved posts
    Saved,
    /// Search captions
    Search { term: String },
    /// List users, newest first
    Users {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Edit your profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub collections: CollectionConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub mutations: MutationConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project: String,
    pub database: Option<PathBuf>,
    pub uploads: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    pub users: String,
    pub posts: String,
    pub saves: String,
    pub bucket: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: u64,
    /// bcrypt cost for stored passwords
    pub password_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: usize,
    pub recent_limit: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MutationConfig {
    /// Restore the previous like state when the remote update fails
    pub rollback_on_failure: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost/v1".to_string(),
            project: "napbook".to_string(),
            database: None,
            uploads: None,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            posts: "posts".to_string(),
            saves: "saves".to_string(),
            bucket: "media".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: 720,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 9,
            recent_limit: 20,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref endpoint) = cli.endpoint {
            config.backend.endpoint = endpoint.clone();
        }
        if let Some(page_size) = cli.page_size {
            config.feed.page_size = page_size;
        }

        config.resolve_paths(&data_dir);
        Ok(config)
    }

    /// Default configuration with every path under `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let mut config = Config::default();
        config.resolve_paths(data_dir);
        config
    }

    fn resolve_paths(&mut self, data_dir: &Path) {
        if self.backend.database.is_none() {
            self.backend.database = Some(data_dir.join("napbook.db"));
        }
        if self.backend.uploads.is_none() {
            self.backend.uploads = Some(data_dir.join("uploads"));
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".napbook")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.backend
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from("napbook.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.backend
            .uploads
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }
}
