use std::io::Write;

use anyhow::Context;
use basin3d_catalog::{Catalog, CatalogSnapshot};
use basin3d_clap_blocks::catalog::CatalogConfig;
use serde::Serialize;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Which records to print
    #[clap(value_enum)]
    records: Records,

    #[clap(flatten)]
    catalog_config: CatalogConfig,

    /// Only records of this datasource
    #[clap(long = "datasource")]
    datasource: Option<String>,

    /// Only records for these comma separated variable names, with or without a datasource
    /// prefix
    #[clap(long = "names", value_delimiter = ',')]
    names: Vec<String>,

    /// Treat `--names` as canonical ids rather than datasource names (variables only;
    /// properties are always selected by canonical id)
    #[clap(long = "from-canonical", action)]
    from_canonical: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Records {
    Variables,
    Properties,
}

pub(crate) fn command(config: Config) -> anyhow::Result<()> {
    let path = config
        .catalog_config
        .catalog_file()
        .context("--catalog-file is required")?;
    let snapshot = CatalogSnapshot::from_file(path)
        .with_context(|| format!("loading catalog file {}", path.display()))?;
    let catalog = Catalog::from_snapshot(snapshot, config.catalog_config.catalog_args())?;

    let names: Vec<&str> = config.names.iter().map(String::as_str).collect();
    let names = (!names.is_empty()).then_some(names.as_slice());
    let datasource = config.datasource.as_deref();

    let mut out = std::io::stdout().lock();
    match config.records {
        Records::Variables => write_lines(
            &mut out,
            catalog.find_observed_property_variables(datasource, names, config.from_canonical)?,
        ),
        Records::Properties => write_lines(
            &mut out,
            catalog.find_observed_properties(datasource, names)?,
        ),
    }
}

fn write_lines<T: Serialize>(
    out: &mut impl Write,
    records: impl Iterator<Item = T>,
) -> anyhow::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
