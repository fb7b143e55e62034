use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docchat::api::ApiClient;
use docchat::auth::{self, LoginForm, SignupForm, TokenStore};
use docchat::cli_adapter;
use docchat::config::Config;
use docchat::coordinator::Coordinator;
use docchat::error::ClientError;
use docchat::render;
use docchat::routes::{AuthGate, NavItem, Navigation, Route};
use docchat::session::SocketSession;
use docchat::workspace::{DocumentBackend, DocumentWorkspace};
use docchat::ws_adapter::WsConnector;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docchat", version, about = "Chat with your documents from the terminal")]
struct Cli {
    /// Explicit config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the auth token
    Login {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored auth token
    Logout,
    /// Uploaded documents and per-document chat
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
    /// Live chat with the agent over the socket
    Agent,
    /// Open a navigation entry (Home, Agent, Docs, Settings)
    Nav { item: String },
}

#[derive(Subcommand, Debug)]
enum DocsAction {
    List,
    Upload { path: PathBuf },
    Delete { document_id: String },
    History { document_id: String },
    Chat {
        document_id: String,
        message: Vec<String>,
    },
}

struct App {
    config: Config,
    api: ApiClient,
    store: TokenStore,
    gate: AuthGate,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    let mut app = App::new(config)?;

    match cli.command {
        Commands::Login { username, password } => {
            app.login(username, password).await?;
        }
        Commands::Signup {
            username,
            email,
            password,
        } => app.signup(username, email, password).await?,
        Commands::Logout => app.logout()?,
        Commands::Docs { action } => {
            app.enter(Route::Home).await?;
            app.run_docs(action).await?;
        }
        Commands::Agent => {
            app.enter(Route::Agent).await?;
            app.run_agent().await?;
        }
        Commands::Nav { item } => {
            let item = NavItem::from_label(&item).with_context(|| {
                let labels: Vec<_> = NavItem::ALL.iter().map(NavItem::label).collect();
                format!("unknown navigation item {item:?} (expected one of {labels:?})")
            })?;
            app.open(item.target()).await?;
        }
    }

    Ok(())
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let store = TokenStore::new(config.auth.token_path.clone());
        let token = store
            .load_or_discard()
            .context("failed to read stored token")?;
        let gate = AuthGate::from_token(token.as_deref());
        let api = ApiClient::new(config.api.base_url.clone())
            .context("failed to build http client")?
            .with_authorization(token);
        Ok(Self {
            config,
            api,
            store,
            gate,
        })
    }

    /// Applies the auth gate to `route`. A redirect runs the login prompt and
    /// then continues to the originally requested route.
    async fn enter(&mut self, route: Route) -> Result<Route> {
        match self.gate.resolve(route) {
            Navigation::Allow(route) => Ok(route),
            Navigation::Redirect { to, from } => {
                tracing::debug!(%from, %to, "redirecting to login");
                println!("{from} requires login");
                self.login(None, None).await?;
                Ok(AuthGate::after_login(Some(from)))
            }
        }
    }

    async fn open(&mut self, route: Route) -> Result<()> {
        match self.enter(route).await? {
            Route::Home => self.run_docs(DocsAction::List).await,
            Route::Agent => self.run_agent().await,
            Route::Login => self.login(None, None).await,
            Route::Signup => self.signup(None, None, None).await,
        }
    }

    async fn login(&mut self, username: Option<String>, password: Option<String>) -> Result<()> {
        let form = LoginForm {
            username: value_or_prompt(username, "Email").await?,
            password: value_or_prompt(password, "Password").await?,
        };
        let value = auth::login(&self.api, &self.store, &form)
            .await
            .map_err(inline_error)?;
        self.api.set_authorization(Some(value));
        self.gate.set_authenticated(true);
        println!("logged in");
        Ok(())
    }

    async fn signup(
        &mut self,
        username: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<()> {
        let form = SignupForm {
            username: value_or_prompt(username, "Username").await?,
            email: value_or_prompt(email, "Email").await?,
            password: value_or_prompt(password, "Password").await?,
        };
        auth::signup(&self.api, &form).await.map_err(inline_error)?;
        println!("account created; run `docchat login` to sign in");
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.store.clear()?;
        self.api.set_authorization(None);
        self.gate.set_authenticated(false);
        println!("logged out");
        Ok(())
    }

    async fn run_docs(&self, action: DocsAction) -> Result<()> {
        let mut workspace = DocumentWorkspace::new(self.api.clone());
        match action {
            DocsAction::List => {
                workspace.refresh().await?;
                print_documents(&workspace);
            }
            DocsAction::Upload { path } => {
                workspace.upload(&path).await.map_err(inline_error)?;
                println!("File Uploaded");
                print_documents(&workspace);
            }
            DocsAction::Delete { document_id } => {
                workspace.refresh().await?;
                workspace.delete(&document_id).await?;
                println!("deleted {document_id}");
                print_documents(&workspace);
            }
            DocsAction::History { document_id } => {
                workspace.refresh().await?;
                workspace.select(&document_id).map_err(inline_error)?;
                let history = workspace.load_history().await?;
                print_lines(&render::render_history(history));
            }
            DocsAction::Chat {
                document_id,
                message,
            } => {
                workspace.refresh().await?;
                let filename = workspace
                    .select(&document_id)
                    .map_err(inline_error)?
                    .filename
                    .clone();
                tracing::debug!(%filename, "chatting about document");
                let history = workspace
                    .send(&message.join(" "))
                    .await
                    .map_err(inline_error)?;
                print_lines(&render::render_history(history));
            }
        }
        Ok(())
    }

    async fn run_agent(&self) -> Result<()> {
        let session = SocketSession::new(self.config.socket.url.clone(), Box::new(WsConnector));
        let mut coordinator = Coordinator::new(session, std::io::stdout());
        let mut input = cli_adapter::spawn_stdin_reader();
        println!("{}", cli_adapter::CHAT_HELP);
        coordinator.run(&mut input).await
    }
}

fn print_documents<B: DocumentBackend>(workspace: &DocumentWorkspace<B>) {
    if workspace.documents().is_empty() {
        println!("No files uploaded");
        return;
    }
    for doc in workspace.documents() {
        println!("{}  {}", doc.document_id, doc.filename);
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

async fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => cli_adapter::prompt_line(label).await,
    }
}

fn inline_error(err: ClientError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
