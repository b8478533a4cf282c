use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use items_list::{
    wrap, History, HttpTagVocabulary, ItemSource, ListContext, ListController, MemoryHistory,
    PaginationUpdate, ResourceItemsSource, StateStorage, TagVocabulary, UrlStateStorage,
};
use shared::{
    domain::{QueryId, Scope},
    protocol::QueryRecord,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod page;

use config::load_settings;
use console::{Command, HELP};
use page::{Query, QueriesView};

#[derive(Parser, Debug)]
#[command(about = "Browse the query catalog from a terminal")]
struct Args {
    /// Settings file; defaults to ./queries.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    /// all, my, favorites or archive
    #[arg(long, default_value = "all")]
    scope: Scope,
    #[arg(long)]
    page_size: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = args.page_size {
        settings.page_size = v;
    }

    let base = settings.server_base()?;
    let history = MemoryHistory::new(page::scope_location(&base, args.scope)?);
    let storage: Arc<dyn StateStorage> = Arc::new(UrlStateStorage::new(
        history.clone(),
        settings.state_defaults(),
    ));
    let resources = page::resources(&base, settings.api_key.clone())?;
    let vocabulary = HttpTagVocabulary::new(&base, page::TAGS_ENDPOINT)?
        .with_api_key(settings.api_key.clone());

    let list = wrap(
        QueriesView::default(),
        move |context: &ListContext| {
            let source = ResourceItemsSource::new(context, &resources, |record: QueryRecord| {
                Query::from(record)
            })?;
            Ok(Arc::new(source) as Arc<dyn ItemSource<Item = Query>>)
        },
        move |_context: &ListContext| Arc::clone(&storage),
    )
    .with_options(settings.controller_options());

    info!(server = %base, scope = %args.scope, "opening query list");
    let mut mounted = list.mount(ListContext::new(args.scope, page::page_title(args.scope)))?;
    println!("{}", page::sidebar_line(args.scope));
    mounted.controller_mut().settle().await;
    println!("{}", mounted.render());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read command")? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(console::CommandError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Vocab => {
                match vocabulary.tags().await {
                    Ok(tags) => {
                        for tag in tags {
                            println!("{} ({})", tag.name, tag.count);
                        }
                    }
                    Err(err) => warn!(%err, "failed to load tags"),
                }
                continue;
            }
            Command::Select(id) => {
                let id = QueryId(id);
                let on_page = mounted
                    .controller()
                    .page_items()
                    .iter()
                    .any(|query| query.id == id);
                if on_page {
                    mounted.component().toggle(mounted.controller(), id);
                } else {
                    println!("query {id} is not on this page");
                }
            }
            Command::All => mounted.component().toggle_all(mounted.controller()),
            Command::Back => {
                if !history.back() {
                    println!("no earlier list state");
                }
            }
            Command::Forward => {
                if !history.forward() {
                    println!("no later list state");
                }
            }
            other => apply(mounted.controller_mut(), other),
        }

        mounted.controller_mut().settle().await;
        println!("{}", mounted.render());
        println!("location: {}", history.location());
    }

    mounted.unmount();
    Ok(())
}

fn apply(controller: &mut ListController<Query>, command: Command) {
    match command {
        Command::Search(term) => controller.update_search(term),
        Command::Tags(tags) => controller.update_selected_tags(tags),
        Command::Sort(column) => controller.toggle_sorting(&page::sort_field_for(&column)),
        Command::Page(page) => controller.update_pagination(PaginationUpdate::page(page)),
        Command::Size(size) => {
            controller.update_pagination(PaginationUpdate::items_per_page(size))
        }
        Command::Reload => controller.reload(),
        Command::Select(_)
        | Command::All
        | Command::Vocab
        | Command::Back
        | Command::Forward
        | Command::Help
        | Command::Quit => {}
    }
}
