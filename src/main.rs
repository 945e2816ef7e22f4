use std::fs;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use classdoc_i18n::loader::{catalog_stats, load_catalog_from_file, load_catalogs_from_dir};
use classdoc_i18n::{BatchReport, Catalog, KeyScheme, Parser, merge, translate_locales};

fn cli() -> Command {
    Command::new("classdoc-i18n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merge translation catalogs into class reference documentation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every merged node")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a documentation directory with one or more catalogs")
                .arg(
                    Arg::new("docs")
                        .long("docs")
                        .short('d')
                        .help("Directory of class reference XML files")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .short('c')
                        .help("Catalog file (.po or .json); repeat for more locales")
                        .action(ArgAction::Append)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("catalog-dir")
                        .long("catalog-dir")
                        .help("Directory of catalogs named by locale, e.g. zh_CN.po or fr.json")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .group(
                    ArgGroup::new("catalogs")
                        .args(["catalog", "catalog-dir"])
                        .required(true)
                        .multiple(true),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output directory; each locale is written to <output>/<locale>")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("locale")
                        .long("locale")
                        .short('l')
                        .help("Locale of the catalog, when it is not declared in it (single catalog only)"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .help("Write the coverage report as JSON to this file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Exit with an error if any document failed")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("stats")
                .about("Show entry counts of a catalog")
                .arg(
                    Arg::new("catalog")
                        .help("Catalog file (.po or .json)")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("keys")
                .about("List the catalog keys of a class reference document")
                .arg(
                    Arg::new("xml")
                        .help("Class reference XML file")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("scheme")
                        .long("scheme")
                        .short('s')
                        .help("Key scheme")
                        .value_parser(["structural", "source-text"])
                        .default_value("structural"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match matches.subcommand() {
        Some(("translate", sub)) => translate(sub).await,
        Some(("stats", sub)) => stats(sub),
        Some(("keys", sub)) => keys(sub),
        _ => Err("no subcommand given".into()),
    }
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a Path, Box<dyn std::error::Error>> {
    matches
        .get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .ok_or_else(|| format!("missing --{id}").into())
}

async fn translate(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let docs = required_path(matches, "docs")?;
    let output = required_path(matches, "output")?;
    let catalog_paths: Vec<&PathBuf> = matches
        .get_many::<PathBuf>("catalog")
        .map(|paths| paths.collect())
        .unwrap_or_default();
    let catalog_dir = matches.get_one::<PathBuf>("catalog-dir");
    let locale = matches.get_one::<String>("locale").map(String::as_str);
    if locale.is_some() && (catalog_paths.len() > 1 || catalog_dir.is_some()) {
        return Err("--locale can only be used with a single --catalog".into());
    }

    let mut loaded: Vec<Catalog> = match catalog_dir {
        Some(dir) => load_catalogs_from_dir(dir)?,
        None => Vec::new(),
    };
    for path in catalog_paths {
        loaded.push(load_catalog_from_file(path, locale)?);
    }

    let mut catalogs: Vec<Catalog> = Vec::with_capacity(loaded.len());
    for catalog in loaded {
        if catalogs.iter().any(|c| c.locale() == catalog.locale()) {
            return Err(format!("more than one catalog for locale '{}'", catalog.locale()).into());
        }
        catalogs.push(catalog);
    }
    if catalogs.is_empty() {
        return Err("no catalogs to translate with".into());
    }

    info!(docs = %docs.display(), output = %output.display(), locales = catalogs.len(), "translating");
    let reports = translate_locales(docs, output, catalogs).await?;

    for report in &reports {
        print_summary(report);
    }

    if let Some(path) = matches.get_one::<PathBuf>("report") {
        fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        info!(path = %path.display(), "report written");
    }

    let failed: usize = reports.iter().map(|r| r.failures.len()).sum();
    if matches.get_flag("strict") && failed > 0 {
        return Err(format!("{failed} document(s) failed").into());
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let total = report.translated() + report.untranslated() + report.skipped();
    println!(
        "{}: {}/{} translated ({:.1}%), {} skipped, {} document(s), {} failed",
        report.locale,
        report.translated(),
        total,
        report.coverage() * 100.0,
        report.skipped(),
        report.documents.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  failed {}: {}", failure.path, failure.message);
    }
}

fn stats(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let path = required_path(matches, "catalog")?;
    let stats = catalog_stats(path)?;
    println!("Total entries: {}", stats.total);
    println!("Translated: {}", stats.translated);
    println!("Untranslated: {}", stats.untranslated);
    println!("Fuzzy: {}", stats.fuzzy);
    Ok(())
}

fn keys(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let path = required_path(matches, "xml")?;
    let scheme: KeyScheme = matches
        .get_one::<String>("scheme")
        .map(String::as_str)
        .unwrap_or("structural")
        .parse()?;

    let content = fs::read_to_string(path)?;
    let document = Parser::new(&content).parse()?;
    // With nothing to look up, every keyable node is reported as untranslated.
    let outcome = merge(&document, &Catalog::new("und", scheme), "und")?;

    for entry in &outcome.report.untranslated_keys {
        println!("{}\t{}", entry.key, entry.location);
    }
    for warning in &outcome.report.warnings {
        eprintln!("skipped {}: {}", warning.location, warning.message);
    }
    Ok(())
}
