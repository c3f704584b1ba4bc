//! Modelforge
//!
//! Builds the bundled storefront model through conventions and fluent
//! configuration, then prints its snapshot.

use anyhow::{Context, Result};
use clap::Parser;
use modelforge_builder::{BuilderConfig, ModelBuilder};
use modelforge_core::{
    MemberAttribute, MemberInfo, TypeDescriptor, TypeRegistry, ValueType, Validatable,
};
use modelforge_metadata::{Model, ModelSnapshot};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modelforge", version, about = "Build and print the storefront model")]
struct Args {
    /// Builder configuration file (TOML)
    #[arg(short, long, env = "MODELFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Convention to turn off; may be repeated
    #[arg(long = "disable", value_name = "CONVENTION")]
    disabled: Vec<String>,

    /// Print one line per entity type instead of the JSON snapshot
    #[arg(long)]
    summary: bool,

    /// Log convention activity
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    let model = build_storefront(config)?;

    if args.summary {
        print_summary(&model);
    } else {
        let json = ModelSnapshot::from_model(&model)
            .to_json_pretty()
            .context("failed to serialize model snapshot")?;
        println!("{json}");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<BuilderConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            BuilderConfig::from_toml_str(&source)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => BuilderConfig::default(),
    };
    for convention in &args.disabled {
        config = config.with_disabled_convention(convention.as_str());
    }
    config.validate().context("invalid builder configuration")?;
    Ok(config)
}

// ============================================================================
// Storefront
// ============================================================================

fn storefront_types() -> TypeRegistry {
    TypeRegistry::new()
        .with_type(
            TypeDescriptor::new("Store.Customer")
                .scalar("Id", ValueType::Int32)
                .with_member(
                    MemberInfo::scalar("Name", ValueType::String)
                        .with_attribute(MemberAttribute::Required)
                        .with_attribute(MemberAttribute::MaxLength(100)),
                )
                .scalar("Email", ValueType::String)
                .collection("Orders", "Store.Order"),
        )
        .with_type(
            TypeDescriptor::new("Store.Order")
                .scalar("Id", ValueType::Int32)
                .scalar("Number", ValueType::String)
                .scalar("PlacedAt", ValueType::DateTime)
                .scalar("CustomerId", ValueType::Int32)
                .reference("Customer", "Store.Customer")
                .collection("Lines", "Store.OrderLine"),
        )
        .with_type(
            TypeDescriptor::new("Store.OrderLine")
                .scalar("Id", ValueType::Int32)
                .scalar("OrderId", ValueType::Int32)
                .scalar("Quantity", ValueType::Int32)
                .reference("Order", "Store.Order")
                .reference("Product", "Store.Product"),
        )
        .with_type(
            TypeDescriptor::new("Store.Product")
                .scalar("Id", ValueType::Int32)
                .scalar("Sku", ValueType::String)
                .scalar("Name", ValueType::String)
                .with_member(
                    MemberInfo::scalar("RowVersion", ValueType::Bytes)
                        .with_attribute(MemberAttribute::ConcurrencyCheck),
                ),
        )
}

fn build_storefront(config: BuilderConfig) -> Result<Model> {
    let mut builder = ModelBuilder::with_config(storefront_types(), config);

    builder
        .entity("Store.Customer")?
        .property("Email")?
        .max_length(Some(256))?;
    builder.entity("Store.Product")?.alternate_key(&["Sku"])?;
    builder
        .entity("Store.Order")?
        .index(&["Number"])?
        .unique(true)?;
    builder
        .entity("Store.OrderLine")?
        .has_one("Store.Product", Some("Product"))?
        .with_many(None)?
        .required(true)?;
    builder.annotation("Relational:DefaultSchema", "store");

    let model = builder.finish().context("storefront model is invalid")?;
    info!(entity_types = model.entity_type_count(), "storefront model ready");
    Ok(model)
}

fn print_summary(model: &Model) {
    for entity in model.entity_types() {
        let properties = model.properties_of(entity.id()).count();
        let foreign_keys = model.foreign_keys_of(entity.id()).count();
        let navigations = model.navigations_of(entity.id()).count();
        println!(
            "{:<24} {properties:>2} properties  {foreign_keys:>2} foreign keys  {navigations:>2} navigations",
            entity.name()
        );
    }
}
