use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use metasheet::condition::{Comparator, Condition};
use metasheet::parser::{self, DataFixture};
use metasheet::source::OperationKind;
use metasheet::{DataSheet, DataSource, Expression, MemoryDataSource, MetaModel, Sorter, Value, Workbench};

#[derive(Parser)]
#[command(name = "metasheet-demo")]
#[command(about = "Run data sheet reads and deletes against in-memory data sources")]
#[command(version)]
struct Args {
    /// Meta model YAML file
    #[arg(long)]
    model: PathBuf,

    /// Data fixture YAML file: data source -> object -> rows
    #[arg(long)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a data sheet and print its rows
    Read {
        /// Object alias
        object: String,

        /// Column expressions, e.g. UID,CUSTOMER__NAME,POSITIONS__AMOUNT:SUM
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Filters as EXPRESSION=VALUE (exact match), repeatable
        #[arg(long = "where")]
        filters: Vec<String>,

        /// Sorters as EXPRESSION or EXPRESSION:DESC, repeatable
        #[arg(long = "sort")]
        sorters: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Print the sheet document as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the native query and subsheets a read would run
    Plan {
        object: String,

        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Delete rows by UID, cascading to dependents, and print the operation log
    Delete {
        object: String,

        /// UIDs to delete
        #[arg(long, value_delimiter = ',', required = true)]
        uids: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metasheet=info,warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let model = parser::parse_file(&args.model).with_context(|| format!("loading {}", args.model.display()))?;
    let fixture = match &args.data {
        Some(path) => parser::parse_data_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => DataFixture::new(),
    };
    let (workbench, sources) = setup(model, &fixture)?;

    match args.command {
        Commands::Read {
            object,
            columns,
            filters,
            sorters,
            limit,
            offset,
            json,
        } => {
            let mut sheet = build_sheet(&workbench, &object, &columns)?;
            for filter in &filters {
                sheet.filters.add_condition(parse_filter(filter)?);
            }
            for sorter in &sorters {
                sheet.sorters.push(parse_sorter(sorter)?);
            }
            sheet.limit = limit;
            sheet.offset = offset;
            workbench.read(&mut sheet)?;
            if json {
                println!("{}", parser::sheet_to_json(&sheet)?);
            } else {
                print_sheet(&sheet);
            }
        }
        Commands::Plan { object, columns } => {
            let mut sheet = build_sheet(&workbench, &object, &columns)?;
            let filters = sheet.filters.clone();
            let plan = metasheet::plan_read(workbench.model(), &mut sheet, filters, 0)?;
            println!("Native query on '{}':", plan.query.object);
            for attribute in &plan.query.attributes {
                match attribute.aggregator {
                    Some(function) => println!("  {} <- {}:{}", attribute.alias, attribute.path, function),
                    None => println!("  {} <- {}", attribute.alias, attribute.path),
                }
            }
            for subsheet in &plan.subsheets {
                println!(
                    "Subsheet '{}' via {} ({} = {}.{})",
                    subsheet.sheet.object(),
                    subsheet.relation_path,
                    subsheet.parent_key_column,
                    subsheet.relation.right_object,
                    subsheet.relation.right_attribute
                );
                for column in subsheet.sheet.columns() {
                    println!("  {}", column.expression());
                }
            }
            if plan.sort_in_memory {
                println!("Sorting and paging after the join");
            }
        }
        Commands::Delete { object, uids } => {
            let mut sheet = workbench.new_sheet(&object)?;
            let Some(uid) = workbench.model().object(&object)?.uid_attribute.clone() else {
                bail!("object '{}' has no UID attribute", object);
            };
            let uids: Vec<Value> = uids.into_iter().map(Value::from).collect();
            sheet.filters.add_condition(Condition::in_list(Expression::parse(&uid)?, uids));
            let deleted = workbench.delete(&sheet, None)?;
            info!(target: "metasheet_demo", "Deleted {} row(s) of '{}'", deleted, object);
            for source in &sources {
                for operation in source.operations() {
                    if matches!(operation.kind, OperationKind::Delete | OperationKind::Commit) {
                        println!(
                            "{:<10} {:<8} {:<16} {}",
                            source.name(),
                            operation.kind.to_string(),
                            operation.object,
                            operation.rows
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

/// A workbench with one in-memory data source per data source of the model
fn setup(model: MetaModel, fixture: &DataFixture) -> anyhow::Result<(Workbench, Vec<MemoryDataSource>)> {
    let mut names: BTreeSet<String> = model.data_sources.iter().map(|ds| ds.name.clone()).collect();
    names.extend(model.objects.iter().map(|o| o.data_source.clone()));
    for name in fixture.keys() {
        if !names.contains(name) {
            bail!("fixture has rows for unknown data source '{}'", name);
        }
    }

    let generator = model.engine.uid_generator;
    let mut workbench = Workbench::new(model);
    let mut sources = Vec::new();
    for name in names {
        let source = MemoryDataSource::new(name.clone()).with_uid_generator(generator);
        if let Some(tables) = fixture.get(&name) {
            for (object, rows) in tables {
                source.insert_rows(object, rows.iter().cloned());
            }
        }
        workbench.register_source(Arc::new(source.clone()));
        sources.push(source);
    }
    Ok((workbench, sources))
}

fn build_sheet(workbench: &Workbench, object: &str, columns: &[String]) -> anyhow::Result<DataSheet> {
    let mut sheet = workbench.new_sheet(object)?;
    for column in columns {
        let expression = Expression::parse_for(column, workbench.model(), object)
            .with_context(|| format!("column '{}'", column))?;
        sheet.add_expression(expression);
    }
    Ok(sheet)
}

fn parse_filter(input: &str) -> anyhow::Result<Condition> {
    let Some((expression, value)) = input.split_once('=') else {
        bail!("filter '{}' is not EXPRESSION=VALUE", input);
    };
    Ok(Condition::new(Expression::parse(expression.trim())?, Comparator::Equals, value.trim()))
}

fn parse_sorter(input: &str) -> anyhow::Result<Sorter> {
    let (expression, direction) = match input.rsplit_once(':') {
        Some((expression, direction)) if direction.eq_ignore_ascii_case("asc") || direction.eq_ignore_ascii_case("desc") => {
            (expression, direction)
        }
        _ => (input, "ASC"),
    };
    Ok(Sorter {
        expression: Expression::parse(expression)?,
        direction: direction.parse()?,
    })
}

fn print_sheet(sheet: &DataSheet) {
    let columns: Vec<&str> = sheet
        .columns()
        .iter()
        .filter(|c| !c.is_hidden())
        .map(|c| c.name())
        .collect();
    let cells: Vec<Vec<String>> = sheet
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(*c).map(Value::to_text).unwrap_or_default())
                .collect()
        })
        .chain(sheet.totals_rows().iter().map(|row| {
            columns
                .iter()
                .map(|c| row.get(*c).map(Value::to_text).unwrap_or_default())
                .collect()
        }))
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| cells.iter().map(|r| r[i].len()).chain([c.len()]).max().unwrap_or(0))
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(columns.clone()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for (i, row) in cells.iter().enumerate() {
        if i == sheet.row_count() {
            println!("{}", widths.iter().map(|w| "=".repeat(*w)).collect::<Vec<_>>().join("=+="));
        }
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("{} of {} row(s)", sheet.row_count(), sheet.total_row_count());
}
