mod terminal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lytchat::attachments::LocalFile;
use lytchat::backend::{BackendClient, ChatBackend};
use lytchat::config::{AttachmentPolicy, Config};
use lytchat::ChatController;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lytchat")]
#[command(about = "Lytchat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: LYTCHAT_CONFIG_PATH or ~/.lytchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// List the models the backend offers.
    Models {
        /// Config file path (default: LYTCHAT_CONFIG_PATH or ~/.lytchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Backend base URL (default: LYTCHAT_API_BASE_URL, config, or http://localhost:8000)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// List stored chats.
    Chats {
        /// Config file path (default: LYTCHAT_CONFIG_PATH or ~/.lytchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Backend base URL (default: LYTCHAT_API_BASE_URL, config, or http://localhost:8000)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// Chat interactively. Type /help for commands.
    Chat {
        /// Config file path (default: LYTCHAT_CONFIG_PATH or ~/.lytchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Backend base URL (default: LYTCHAT_API_BASE_URL, config, or http://localhost:8000)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Existing chat (id or title) to continue.
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Model to select at start.
        #[arg(long, short, value_name = "MODEL")]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("lytchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Models { config, base_url }) => {
            if let Err(e) = run_models(config, base_url).await {
                log::error!("listing models failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chats { config, base_url }) => {
            if let Err(e) = run_chats(config, base_url).await {
                log::error!("listing chats failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            base_url,
            session,
            model,
        }) => {
            if let Err(e) = run_chat(config, base_url, session, model).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lytchat::config::default_config_path);
    let _dir = lytchat::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", path.display());
    Ok(())
}

fn connect(
    config_path: Option<PathBuf>,
    base_url: Option<String>,
) -> anyhow::Result<(Config, BackendClient)> {
    let (config, path) = lytchat::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    let base_url = base_url.unwrap_or_else(|| lytchat::config::resolve_base_url(&config));
    let client = BackendClient::new(&base_url)?;
    log::info!("backend at {}", client.base_url());
    Ok((config, client))
}

async fn run_models(config_path: Option<PathBuf>, base_url: Option<String>) -> anyhow::Result<()> {
    let (_, client) = connect(config_path, base_url)?;
    for model in client.list_models().await? {
        println!("{}", model);
    }
    Ok(())
}

async fn run_chats(config_path: Option<PathBuf>, base_url: Option<String>) -> anyhow::Result<()> {
    let (_, client) = connect(config_path, base_url)?;
    for chat in client.list_chats().await? {
        if chat.id == chat.title {
            println!("{}", chat.id);
        } else {
            println!("{}\t{}", chat.id, chat.title);
        }
    }
    Ok(())
}

const HELP: &str = "\
/new [model]          start a new chat
/switch <chat>        open a chat by id or title (\"new\" starts one)
/delete [chat]        delete a chat (default: the current one)
/chats                list chats
/models               list models
/model <name>         change the model of the current chat
/url <address>        scrape a website into the chat context
/attach <path>...     attach local files
/ref <file>           attach a file the backend already has
/detach <name>        remove an attachment
/files                list the chat's context files
/use <file>           make a context file the active context
/contexts             list long-context options
/context <name|none>  select a long-context option
/exit                 quit";

async fn run_chat(
    config_path: Option<PathBuf>,
    base_url: Option<String>,
    session: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, client) = connect(config_path, base_url)?;
    let policy = config.chat.attachment_policy;
    let controller = ChatController::new(client, config.chat, Arc::new(terminal::TerminalView));
    controller
        .load()
        .await
        .context("could not reach the chat backend")?;
    // Loading a chat selects its stored model, so the requested model goes last.
    if let Some(session) = session {
        controller.switch_chat(&session).await?;
    }
    if let Some(model) = model {
        controller.change_model(&model).await?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.starts_with('/') {
            run_command(&controller, policy, input).await;
            continue;
        }
        // Failures are already shown in the transcript.
        if let Err(e) = controller.send_message(input).await {
            log::debug!("send failed: {}", e);
        }
    }

    Ok(())
}

async fn run_command<B: ChatBackend>(
    controller: &ChatController<B>,
    policy: AttachmentPolicy,
    input: &str,
) {
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (input, ""),
    };
    if let Err(e) = slash_command(controller, policy, command, arg).await {
        eprintln!("error: {:#}", e);
    }
}

async fn slash_command<B: ChatBackend>(
    controller: &ChatController<B>,
    policy: AttachmentPolicy,
    command: &str,
    arg: &str,
) -> anyhow::Result<()> {
    match command {
        "/help" => println!("{}", HELP),
        "/new" => {
            let model = Some(arg).filter(|m| !m.is_empty());
            let id = controller.create_chat(model).await?;
            println!("* new chat {}", id);
        }
        "/switch" => {
            controller.switch_chat(arg).await?;
        }
        "/delete" => {
            let target = match arg {
                "" => controller
                    .current_chat_id()
                    .await
                    .context("no chat to delete")?,
                a => a.to_string(),
            };
            controller.delete_chat(&target).await?;
            if let Some(id) = controller.current_chat_id().await {
                println!("* current chat: {}", id);
            }
        }
        "/chats" => {
            let current = controller.current_chat_id().await;
            for chat in controller.refresh_chats().await? {
                let mark = if current.as_deref() == Some(chat.id.as_str()) { "*" } else { " " };
                if chat.id == chat.title {
                    println!("{} {}", mark, chat.id);
                } else {
                    println!("{} {}\t{}", mark, chat.id, chat.title);
                }
            }
        }
        "/models" => {
            let selected = controller.selected_model().await;
            for model in controller.refresh_models().await? {
                let mark = if selected.as_deref() == Some(model.as_str()) { "*" } else { " " };
                println!("{} {}", mark, model);
            }
        }
        "/model" => {
            controller.change_model(arg).await?;
            if let Some(model) = controller.selected_model().await {
                println!("* model: {}", model);
            }
        }
        "/url" => {
            controller.attach_url(arg).await?;
        }
        "/attach" => {
            let mut files = Vec::new();
            for path in arg.split_whitespace() {
                files.push(read_local_file(Path::new(path)).await?);
            }
            match policy {
                AttachmentPolicy::Stateless => controller.stage_files(files).await?,
                AttachmentPolicy::SessionScoped => controller.attach_files(files).await?,
            }
            print_attachments(controller).await;
        }
        "/ref" => {
            controller.attach_backend_file(arg).await?;
            print_attachments(controller).await;
        }
        "/detach" => {
            if !controller.detach(arg).await {
                println!("* nothing attached as {}", arg);
            }
            print_attachments(controller).await;
        }
        "/files" => {
            for file in controller.list_context_files().await? {
                println!("  {}", file);
            }
        }
        "/use" => {
            controller.use_file_as_context(arg).await?;
        }
        "/contexts" => {
            let selected = controller.long_context_selection().await;
            let options = controller.long_context_options().await?;
            for name in options.names() {
                let mark = if selected.as_deref() == Some(name) { "*" } else { " " };
                println!("{} {}", mark, name);
            }
        }
        "/context" => {
            let name = match arg {
                "" | "none" => None,
                a => Some(a),
            };
            controller.select_long_context(name).await?;
        }
        other => println!("unknown command {} (try /help)", other),
    }
    Ok(())
}

async fn read_local_file(path: &Path) -> anyhow::Result<LocalFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(LocalFile::new(name, bytes))
}

async fn print_attachments<B: ChatBackend>(controller: &ChatController<B>) {
    let attached = controller.attachments().await;
    if attached.is_empty() {
        println!("* no attachments");
        return;
    }
    let names: Vec<&str> = attached.iter().map(|a| a.name()).collect();
    println!("* attached: {}", names.join(", "));
}
