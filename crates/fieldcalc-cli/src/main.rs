//! fieldcalc CLI - check, evaluate and apply calculated-field formulas

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fieldcalc::prelude::*;
use fieldcalc::{evaluate_formula, resolve_formulas, scan, validate};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Cell written for formulas that cannot be calculated
const ERROR_CELL: &str = "#ERROR";

#[derive(Parser)]
#[command(name = "fieldcalc")]
#[command(author, version, about = "Calculated-field formula tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scanned tokens of a formula
    Tokens {
        /// Formula text
        formula: String,
    },

    /// Validate a formula and list its errors
    Check {
        /// Formula text
        formula: String,

        /// Allowed reference names (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        refs: Option<Vec<String>>,
    },

    /// Evaluate a single formula
    Eval {
        /// Formula text
        formula: String,

        /// Reference value as name=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Resolve evaluation order and cross-formula errors
    Resolve {
        /// JSON file with an object of name -> formula
        formulas: PathBuf,

        /// Allowed reference names (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        refs: Option<Vec<String>>,

        /// Print the resolved entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Calculate formulas for every record of a CSV file
    Run {
        /// JSON file with an object of name -> formula
        formulas: PathBuf,

        /// Input CSV file; the header row names the fields
        records: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tokens { formula } => print_tokens(&formula),
        Commands::Check { formula, refs } => check(&formula, refs.as_deref()),
        Commands::Eval { formula, fields } => eval(&formula, fields),
        Commands::Resolve {
            formulas,
            refs,
            json,
        } => resolve(&formulas, refs.as_deref(), json),
        Commands::Run {
            formulas,
            records,
            output,
        } => run(&formulas, &records, output.as_deref()),
    }
}

fn parse_field(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{arg}'"))
}

fn print_tokens(formula: &str) -> Result<()> {
    for token in scan(formula) {
        println!("{}\t{:?}", token.kind, token.value);
    }
    Ok(())
}

fn check(formula: &str, refs: Option<&[String]>) -> Result<()> {
    let errors = validate(&scan(formula), refs);
    if errors.is_empty() {
        eprintln!("Formula is valid");
        return Ok(());
    }

    for error in &errors {
        println!("{error}");
    }
    bail!("{} validation error(s)", errors.len())
}

fn eval(formula: &str, fields: Vec<(String, String)>) -> Result<()> {
    let fields: HashMap<String, String> = fields
        .into_iter()
        .map(|(name, value)| (name.to_lowercase(), value))
        .collect();

    let value = evaluate_formula(formula, |name| {
        fields.get(&name.to_lowercase()).cloned().unwrap_or_default()
    });
    println!("{value}");
    Ok(())
}

fn read_formulas(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| {
        format!(
            "'{}' must hold a JSON object of name -> formula",
            path.display()
        )
    })
}

fn resolve(path: &Path, refs: Option<&[String]>, json: bool) -> Result<()> {
    let formulas = read_formulas(path)?;
    let entries = resolve_formulas(formulas, refs);

    if json {
        let text = serde_json::to_string_pretty(&entries).context("Failed to encode entries")?;
        println!("{text}");
        return Ok(());
    }

    let mut invalid = 0;
    for entry in entries.values() {
        print!("{}", describe_entry(entry));
        if !entry.is_valid() {
            invalid += 1;
        }
    }

    eprintln!("Resolved {} formulas ({} invalid)", entries.len(), invalid);
    Ok(())
}

/// Summary line of a resolved entry followed by one indented line per error
fn describe_entry(entry: &FormulaEntry) -> String {
    let mut text = format!(
        "{}\torder {}\tdepends on [{}]\n",
        entry.reference_name_orig,
        entry.order,
        entry.dependencies.join(", ")
    );
    for error in &entry.validation_errors {
        text.push_str(&format!("    {error}\n"));
    }
    text
}

fn run(formulas: &Path, records: &Path, output: Option<&Path>) -> Result<()> {
    let formulas = read_formulas(formulas)?;
    let input =
        File::open(records).with_context(|| format!("Failed to open '{}'", records.display()))?;

    if let Some(path) = output {
        let file =
            File::create(path).with_context(|| format!("Failed to write '{}'", path.display()))?;
        let rows = calculate_csv(&formulas, input, file)?;
        eprintln!("Wrote {} rows to '{}'", rows, path.display());
    } else {
        let rows = calculate_csv(&formulas, input, io::stdout().lock())?;
        eprintln!("Calculated {rows} rows");
    }

    Ok(())
}

/// Copy CSV records from `input` to `output`, appending one column per formula
///
/// Returns the number of data rows written.
fn calculate_csv<R: Read, W: Write>(
    formulas: &BTreeMap<String, String>,
    input: R,
    output: W,
) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let options = CalculationOptions::default().with_supported_refs(headers.iter().cloned());
    let set = FormulaSet::with_options(formulas, &options);
    for entry in set.invalid_entries() {
        let errors: Vec<String> = entry
            .validation_errors
            .iter()
            .map(ToString::to_string)
            .collect();
        eprintln!(
            "Warning: formula '{}' is invalid: {}",
            set.original_name(entry),
            errors.join("; ")
        );
    }

    let columns: Vec<&str> = formulas.keys().map(String::as_str).collect();
    let mut writer = csv::Writer::from_writer(output);
    writer
        .write_record(headers.iter().map(String::as_str).chain(columns.iter().copied()))
        .context("Failed to write CSV header")?;

    let mut rows = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV record {}", line + 1))?;
        let result = set.calculate(headers.iter().map(String::as_str).zip(record.iter()));

        let cells = columns
            .iter()
            .map(|name| result.values.get(*name).map_or(ERROR_CELL, String::as_str));
        writer
            .write_record(record.iter().chain(cells))
            .context("Failed to write CSV record")?;
        rows += 1;
    }

    writer.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn formulas(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, formula)| (name.to_string(), formula.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("price=4.99"),
            Ok(("price".to_string(), "4.99".to_string()))
        );
        assert_eq!(
            parse_field("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_field("price").is_err());
    }

    #[test]
    fn test_describe_entry() {
        let entries = resolve_formulas(
            formulas(&[("Total", "{Net} * 2"), ("Net", "5 5")]),
            None,
        );

        assert_eq!(
            describe_entry(&entries["total"]),
            "Total\torder 2\tdepends on [net]\n    \
             Depends on an invalid formula at token 1 (`Net`)\n"
        );
        assert_eq!(
            describe_entry(&entries["net"]),
            "Net\torder 1\tdepends on []\n    \
             An operator is required before the number at token 2 (`5`)\n"
        );
    }

    #[test]
    fn test_calculate_csv() {
        let formulas = formulas(&[("Total", "{price} * {qty}"), ("Label", "uppercase({name})")]);
        let input = "name,price,qty\nwidget,2.5,4\nbolt,0.1,3\n";

        let mut output = Vec::new();
        let rows = calculate_csv(&formulas, input.as_bytes(), &mut output).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "name,price,qty,Label,Total\n\
             widget,2.5,4,WIDGET,10\n\
             bolt,0.1,3,BOLT,0.3\n"
        );
    }

    #[test]
    fn test_calculate_csv_marks_invalid_formulas() {
        let formulas = formulas(&[("Net", "{price} -"), ("Unknown", "{cost} * 2")]);
        let input = "price\n10\n";

        let mut output = Vec::new();
        calculate_csv(&formulas, input.as_bytes(), &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "price,Net,Unknown\n10,#ERROR,#ERROR\n"
        );
    }
}
