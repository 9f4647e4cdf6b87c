use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use jsoncolumn::fixtures::{self, IceCream};
use jsoncolumn::{
    Connection, Filter, OrderBy, Predicate, SchemaRegistry, Session, StorageConfig, Value,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jsoncolumn")]
#[command(about = "Seeds the ice cream sample table and runs JSON queries against it")]
struct Cli {
    /// Storage URL, e.g. memory://localhost/shop?max_retries=3
    #[arg(long)]
    url: Option<String>,
    /// Abort reads on the first row that fails to decode
    #[arg(long)]
    strict: bool,
    #[arg(long)]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.url {
        Some(url) => StorageConfig::from_url(url).context("invalid storage URL")?,
        None => StorageConfig::default(),
    };
    if cli.strict {
        config = config.strict_decode(true);
    }
    if let Some(max_retries) = cli.max_retries {
        config = config.max_retries(max_retries);
    }
    info!(url = %config.to_url(), "opening storage");

    let registry = Arc::new(SchemaRegistry::builder().register::<IceCream>()?.build());
    let session = Session::new(Connection::in_memory(config)?, registry);

    session.ensure_table::<IceCream>().await?;
    session.create(fixtures::seed()?).await?;

    let all = session.load_all::<IceCream>(OrderBy::identity()).await?;
    ensure!(all.len() == 4, "expected 4 ice creams, got {}", all.len());
    let primary = all.entities[3].primary_supplier_information.root();
    ensure!(primary.get("Name")?.as_str()? == "Fine Dine");
    ensure!(all.entities[0].all_supplier_informations.len() == 2);
    ensure!(all.entities[0].all_supplier_informations[1].name == "Fast Fooood");
    println!("loaded {} ice creams", all.len());

    let yellow = session
        .query::<IceCream>(&Predicate::contains("Tags", "yellow").into(), OrderBy::identity())
        .await?;
    report("tagged yellow", &yellow.entities);

    let yellow_coloring = session
        .query_raw::<IceCream>(
            "select * from `IceCreams` where json_contains(`FoodAdditives`, json_quote(?), '$') <> 0",
            vec![Value::from("E102")],
            OrderBy::identity(),
        )
        .await?;
    report("with E102 (raw SQL)", &yellow_coloring.entities);

    let red_coloring = session
        .query::<IceCream>(
            &Predicate::contains("FoodAdditives", "E124").into(),
            OrderBy::identity(),
        )
        .await?;
    report("with E124", &red_coloring.entities);

    let fine_dine = session
        .query::<IceCream>(
            &Filter::from(Predicate::contains_at_path(
                "AllSupplierInformations",
                "$[*].Name",
                "Fine Dine",
            )),
            OrderBy::identity(),
        )
        .await?;
    report("supplied by Fine Dine", &fine_dine.entities);

    let primarily_fine_dine = session
        .query::<IceCream>(
            &Predicate::field_equals("PrimarySupplierInformation", "$.Name", "Fine Dine").into(),
            OrderBy::identity(),
        )
        .await?;
    report("primarily supplied by Fine Dine", &primarily_fine_dine.entities);

    let mut vanilla = session
        .find::<IceCream>(1)
        .await?
        .context("Vanilla is missing")?;
    vanilla.values = vanilla.values.clone().into_iter().rev().collect();
    vanilla.name = "Vanilla Bean".into();
    let saved = session.save(&mut vanilla).await?;
    println!("saved Vanilla: wrote {:?}, skipped {:?}", saved.written, saved.skipped);

    Ok(())
}

fn report(label: &str, ice_creams: &[jsoncolumn::Tracked<IceCream>]) {
    let names: Vec<&str> = ice_creams.iter().map(|i| i.name.as_str()).collect();
    println!("{} ice creams {}: {}", names.len(), label, names.join(", "));
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jsoncolumn=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
