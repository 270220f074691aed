use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use listweave_config::Config;
use listweave_engine::lists::invariant_breaches;
use listweave_engine::view::marker::{TODO_ATTRIBUTE, glyph_marker, todo_marker};
use listweave_engine::{
    AttributeSchema, AttributeValue, Block, BlockId, BlockStore, Command, EditorOptions, IdSource,
    ListEditor, ListType, MarkerRegistry, NewBlock, export_markdown, import_markdown,
    read_document, to_html, write_document,
};
use std::path::{Path, PathBuf};
use std::{process, sync::Arc};

/// Inspect and edit nested markdown lists through the flat list model
#[derive(Parser, Debug)]
#[command(name = "listweave", version)]
struct Cli {
    /// Config file to use instead of ~/.config/listweave/config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Generate deterministic item ids (item1, item2, ...) instead of uuids
    #[arg(long, global = true)]
    stable_ids: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Import a markdown file and print it in the chosen format
    Render {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Outline)]
        format: Format,
    },
    /// Report list inconsistencies found in a markdown file
    Check { file: PathBuf },
    /// Run an editing command on blocks, given by their 1-based position
    Apply {
        file: PathBuf,
        #[arg(value_enum)]
        action: Action,
        #[arg(required = true)]
        blocks: Vec<usize>,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        /// Write the resulting markdown back to the file
        #[arg(long)]
        write: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Outline,
    Html,
    Flat,
    Markdown,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Bulleted,
    Numbered,
    Indent,
    Outdent,
    Split,
    Merge,
    Check,
    Uncheck,
}

impl Action {
    fn command(self) -> Command {
        match self {
            Action::Bulleted => Command::ToggleList(ListType::Bulleted),
            Action::Numbered => Command::ToggleList(ListType::Numbered),
            Action::Indent => Command::Indent,
            Action::Outdent => Command::Outdent,
            Action::Split => Command::SplitItem,
            Action::Merge => Command::MergeBackward,
            Action::Check | Action::Uncheck => Command::SetMarker {
                attribute: TODO_ATTRIBUTE.to_string(),
                value: Some(AttributeValue::Bool(self == Action::Check)),
            },
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => Config::expand_path(path),
        None => Config::config_path(),
    };
    log::debug!("Config path: {}", config_path.display());

    match Config::load_from_path(&config_path)? {
        Some(config) => Ok(config),
        None if path.is_some() => bail!("config file not found: {}", config_path.display()),
        None => Ok(Config::default()),
    }
}

fn editor_options(config: &Config, stable_ids: bool) -> Result<EditorOptions> {
    let mut markers = MarkerRegistry::new();
    if config.markers.todo {
        markers.register(todo_marker())?;
    }
    if config.markers.glyph {
        markers.register(glyph_marker())?;
    }

    Ok(EditorOptions {
        max_fixer_passes: config.max_fixer_passes,
        id_source: if stable_ids {
            IdSource::sequential("item")
        } else {
            IdSource::Random
        },
        schema: AttributeSchema::default().with_rejected_kinds(config.non_list_content.iter().cloned()),
        markers: Arc::new(markers),
    })
}

/// Imported blocks whose kind the schema refuses lose their list attributes.
fn import(content: &str, options: &mut EditorOptions) -> Vec<NewBlock> {
    let mut blocks = import_markdown(content, &mut options.id_source);
    for block in &mut blocks {
        if block.list.is_some() && !options.schema.can_host_list(&block.content.kind) {
            log::warn!(
                "{} block cannot be a list item; importing it as plain content",
                block.content.kind
            );
            block.list = None;
        }
    }
    blocks
}

fn open(file: &Path, options: EditorOptions) -> Result<ListEditor> {
    let path = Config::expand_path(file);
    let content =
        read_document(&path).with_context(|| format!("reading {}", path.display()))?;
    let mut options = options;
    let blocks = import(&content, &mut options);
    Ok(ListEditor::from_blocks(options, blocks)?)
}

fn flat(editor: &ListEditor) -> String {
    let query = editor.query();
    let mut out = String::new();
    for (index, block) in editor.blocks().iter().enumerate() {
        let line = match &block.list {
            Some(list) => {
                let marker = if !query.is_first_block_of_item(block.id) {
                    "+".to_string()
                } else {
                    match &list.list_type {
                        ListType::Bulleted => "*".to_string(),
                        ListType::Numbered => "#".to_string(),
                        ListType::Custom(name) => format!("?{name}"),
                    }
                };
                format!(
                    "{}{marker} {} {{{}}}",
                    "  ".repeat(list.indent),
                    block.content.text,
                    list.item_id
                )
            }
            None => block.content.text.clone(),
        };
        out.push_str(&format!("{:>4} {line}\n", index + 1));
    }
    out
}

fn render(editor: &ListEditor, format: Format) -> String {
    match format {
        Format::Outline => editor.view().outline(),
        Format::Html => format!("{}\n", to_html(editor.view())),
        Format::Flat => flat(editor),
        Format::Markdown => export_markdown(editor.blocks()),
    }
}

fn selection(blocks: &[Block], positions: &[usize]) -> Result<Vec<BlockId>> {
    positions
        .iter()
        .map(|&position| match position.checked_sub(1).and_then(|i| blocks.get(i)) {
            Some(block) => Ok(block.id),
            None => bail!(
                "block {position} out of range (document has {} blocks)",
                blocks.len()
            ),
        })
        .collect()
}

fn check(file: &Path, mut options: EditorOptions) -> Result<bool> {
    let path = Config::expand_path(file);
    let content =
        read_document(&path).with_context(|| format!("reading {}", path.display()))?;
    let blocks = import(&content, &mut options);

    // Breaches of the document as written, before any repair
    let raw = BlockStore::with_blocks(options.schema.clone(), IdSource::Random, blocks.clone())?;
    let breaches = invariant_breaches(raw.blocks());
    for breach in &breaches {
        println!("{}: {breach:?}", raw.index_of(breach.block()).map_or(0, |i| i + 1));
    }

    let editor = ListEditor::from_blocks(options, blocks)?;
    for diagnostic in editor.diagnostics() {
        println!("{:?}: {}", diagnostic.kind, diagnostic.message);
    }

    let clean = breaches.is_empty() && editor.diagnostics().is_empty();
    if clean {
        println!("{}: ok", path.display());
    }
    Ok(clean)
}

fn run(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref())?;
    let options = editor_options(&config, cli.stable_ids)?;

    match cli.command {
        CliCommand::Render { file, format } => {
            let editor = open(&file, options)?;
            print!("{}", render(&editor, format));
            Ok(true)
        }
        CliCommand::Check { file } => check(&file, options),
        CliCommand::Apply {
            file,
            action,
            blocks,
            format,
            write,
        } => {
            let mut editor = open(&file, options)?;
            let selected = selection(editor.blocks(), &blocks)?;
            let command = action.command();

            let (outcome, summary) = editor.execute(&command, &selected)?;
            if !outcome.is_applied() {
                log::warn!("{action:?} is not applicable here: {outcome:?}");
                return Ok(false);
            }
            log::info!(
                "{action:?}: {} change(s), {} repaired, {} item(s) reconverted",
                summary.feed.changes.len(),
                summary.fixed.changed.len(),
                summary.conversion.reconverted.len()
            );

            if write {
                let path = Config::expand_path(&file);
                write_document(&path, &export_markdown(editor.blocks()))?;
            }
            print!("{}", render(&editor, format));
            Ok(true)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if !run(cli)? {
        process::exit(1);
    }
    Ok(())
}
