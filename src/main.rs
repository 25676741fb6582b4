use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use napbook::auth::validation::{PostForm, SigninForm, SignupForm};
use napbook::auth::{AuthFailure, Navigation, SignedIn};
use napbook::backend::{FileUpload, LocalBackend, LocalStore};
use napbook::config::{Cli, Command, Config};
use napbook::models::{Post, PostEdit, ProfileEdit, UserProfile};
use napbook::mutations::{Outcome, PostStats, SaveAction};
use napbook::scope::ViewScope;
use napbook::state::AppState;

const SESSION_FILE: &str = "session";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    let store = LocalStore::open(&config)?;

    // Resume the session of the previous invocation, if any
    let session_path = data_dir.join(SESSION_FILE);
    let backend = match read_session(&session_path).await {
        Some(secret) => store.connect_with_session(secret),
        None => store.connect(),
    };
    let backend = Arc::new(backend);
    let app = AppState::new(config, backend.clone());

    let cli_session = CliSession {
        app,
        backend,
        session_path,
    };
    cli_session.run(cli.command).await
}

async fn read_session(path: &Path) -> Option<String> {
    let secret = tokio::fs::read_to_string(path).await.ok()?;
    let secret = secret.trim();
    (!secret.is_empty()).then(|| secret.to_string())
}

struct CliSession {
    app: AppState,
    backend: Arc<LocalBackend>,
    session_path: PathBuf,
}

impl CliSession {
    async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Signup {
                name,
                username,
                email,
                password,
            } => {
                let form = SignupForm {
                    name,
                    username,
                    email,
                    password,
                };
                let signed_in = self.app.auth().sign_up(&form).await;
                self.finish_sign_in(signed_in).await
            }
            Command::Signin { email, password } => {
                let form = SigninForm { email, password };
                let signed_in = self.app.auth().sign_in(&form).await;
                self.finish_sign_in(signed_in).await
            }
            Command::Signout => {
                match self.app.auth().sign_out().await? {
                    Some(()) => println!("Signed out"),
                    None => println!("No active session"),
                }
                self.forget_session().await
            }
            Command::Whoami => {
                let user = self.require_user("/").await?;
                print_profile(&user);
                Ok(())
            }
            Command::Post {
                caption,
                image,
                location,
                tags,
            } => {
                let user = self.require_user("/create-post").await?;
                let file = FileUpload::read(&image)
                    .await
                    .with_context(|| format!("reading {}", image.display()))?;
                let form = PostForm {
                    caption,
                    files: vec![file],
                    location,
                    tags,
                };
                let new_post = form.validate(&user.id)?;
                let post = self.app.create_post(&new_post).await?;
                println!("Created post {}", post.id);
                print_post(&post);
                Ok(())
            }
            Command::EditPost {
                id,
                caption,
                location,
                tags,
                image,
            } => {
                let user = self.require_user(&format!("/update-post/{}", id)).await?;
                let post = self.app.post_by_id(&id).await?;
                ensure_creator(&post, &user)?;
                let file = match image {
                    Some(path) => Some(FileUpload::read(&path).await?),
                    None => None,
                };
                let updated = self
                    .app
                    .update_post(&PostEdit {
                        post_id: post.id.clone(),
                        caption,
                        file,
                        image_url: post.image_url.clone(),
                        image_id: post.image_id.clone(),
                        location,
                        tags,
                    })
                    .await?;
                print_post(&updated);
                Ok(())
            }
            Command::DeletePost { id } => {
                let user = self.require_user(&format!("/posts/{}", id)).await?;
                let post = self.app.post_by_id(&id).await?;
                ensure_creator(&post, &user)?;
                self.app.delete_post(&post.id, &post.image_id).await?;
                println!("Deleted post {}", post.id);
                Ok(())
            }
            Command::Feed { pages } => {
                self.require_user("/").await?;
                let mut feed = self.app.feed();
                for _ in 0..pages {
                    if feed.fetch_next_page().await? == 0 {
                        break;
                    }
                }
                for post in feed.posts() {
                    print_post(post);
                }
                if !feed.has_next_page() {
                    println!("(end of feed)");
                }
                Ok(())
            }
            Command::Recent => {
                self.require_user("/").await?;
                for post in self.app.recent_posts().await?.iter() {
                    print_post(post);
                }
                Ok(())
            }
            Command::Show { id } => {
                self.require_user(&format!("/posts/{}", id)).await?;
                print_post(&*self.app.post_by_id(&id).await?);
                Ok(())
            }
            Command::Like { id } => {
                let user = self.require_user(&format!("/posts/{}", id)).await?;
                let post = self.app.post_by_id(&id).await?;
                let scope = ViewScope::new();
                let stats = PostStats::new(&self.app, &post, &user.id, scope.token());

                let outcome = stats.toggle_like().await?;
                let verb = if stats.is_liked() { "Liked" } else { "Unliked" };
                match outcome {
                    Some(Outcome::Confirmed) => {
                        println!("{} post {} ({} likes)", verb, id, stats.like_count())
                    }
                    Some(Outcome::RolledBack) => bail!("Could not update like on post {}", id),
                    Some(Outcome::LeftStale) | None => {
                        println!("Like on post {} may not have been saved", id)
                    }
                }
                Ok(())
            }
            Command::Save { id } => {
                let user = self.require_user(&format!("/posts/{}", id)).await?;
                let post = self.app.post_by_id(&id).await?;
                let scope = ViewScope::new();
                let stats = PostStats::new(&self.app, &post, &user.id, scope.token());
                stats.refresh_saved().await?;
                match stats.toggle_save().await? {
                    SaveAction::Saved(_) => println!("Saved post {}", id),
                    SaveAction::Unsaved => println!("Removed post {} from saved", id),
                }
                Ok(())
            }
            Command::Saved => {
                self.require_user("/saved").await?;
                let posts = self.app.saved_posts().await?;
                if posts.is_empty() {
                    println!("No saved posts");
                }
                for post in posts.iter() {
                    print_post(post);
                }
                Ok(())
            }
            Command::Search { term } => {
                self.require_user("/explore").await?;
                let posts = self.app.search_posts(&term).await?;
                println!("{} result(s) for {:?}", posts.len(), term);
                for post in posts.iter() {
                    print_post(post);
                }
                Ok(())
            }
            Command::Users { limit } => {
                self.require_user("/all-users").await?;
                for user in self.app.users(limit).await?.iter() {
                    println!("{}  @{}  {}", user.id, user.username, user.name);
                }
                Ok(())
            }
            Command::Profile {
                name,
                bio,
                image_url,
            } => {
                let user = self.require_user("/update-profile/me").await?;
                let updated = self
                    .app
                    .update_user(&ProfileEdit {
                        user_id: user.id.clone(),
                        name: name.unwrap_or(user.name),
                        bio: bio.unwrap_or(user.bio),
                        image_url: image_url.unwrap_or(user.image_url),
                    })
                    .await?;
                print_profile(&updated);
                Ok(())
            }
        }
    }

    /// Run the route guard for `path` and return the signed-in profile.
    async fn require_user(&self, path: &str) -> anyhow::Result<UserProfile> {
        match self.app.navigate(path).await {
            Navigation::Proceed | Navigation::Exempt => {}
            Navigation::Redirect(_) => bail!("Not signed in. Run `napbook signin` first."),
            Navigation::NotFound => bail!("Unknown page {}", path),
        }
        let current = self.app.current_user().await?;
        let current = current
            .as_ref()
            .as_ref()
            .ok_or_else(|| anyhow!("Not signed in. Run `napbook signin` first."))?;
        Ok(current.profile.clone())
    }

    async fn finish_sign_in(&self, result: Result<SignedIn, AuthFailure>) -> anyhow::Result<()> {
        // A session may exist even if verification failed; keep it so the
        // next invocation can retry.
        self.remember_session().await?;
        match result {
            Ok(signed_in) => {
                println!(
                    "Signed in as {} (@{})",
                    signed_in.user.name, signed_in.user.username
                );
                Ok(())
            }
            Err(failure) => {
                let notice = failure.notice();
                match notice.link {
                    Some(link) => bail!("{}: {} (see {})", notice.title, notice.description, link),
                    None => bail!("{}: {}", notice.title, notice.description),
                }
            }
        }
    }

    async fn remember_session(&self) -> anyhow::Result<()> {
        match self.backend.session_secret().await {
            Some(secret) => tokio::fs::write(&self.session_path, secret).await?,
            None => self.forget_session().await?,
        }
        Ok(())
    }

    async fn forget_session(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.session_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_creator(post: &Post, user: &UserProfile) -> anyhow::Result<()> {
    if post.creator != user.id {
        bail!("Post {} belongs to another user", post.id);
    }
    Ok(())
}

fn print_profile(user: &UserProfile) {
    println!("{} (@{}) <{}>", user.name, user.username, user.email);
    println!("  id: {}", user.id);
    if !user.bio.is_empty() {
        println!("  bio: {}", user.bio);
    }
    println!("  avatar: {}", user.image_url);
}

fn print_post(post: &Post) {
    println!(
        "{}  {}  [{}]  {} like(s)",
        post.id,
        post.created_at.format("%Y-%m-%d %H:%M"),
        post.location,
        post.likes.len()
    );
    println!("  {}", post.caption);
    if !post.tags.is_empty() {
        println!("  #{}", post.tags.join(" #"));
    }
    println!("  {}", post.image_url);
}
