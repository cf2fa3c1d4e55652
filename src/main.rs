use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use xlsforge::cli;
use xlsforge::error::{CompileError, CompileResult};

#[derive(Parser)]
#[command(name = "xlsforge")]
#[command(about = "Compile game-data workbooks into Lua tables for client and server")]
#[command(long_about = "xlsforge - spreadsheet → Lua data compiler

Every sheet of the export map is validated against its eight header rows
(name, key, type, primary, required, depends, target), its rows are checked
and typed, and one Lua module per sheet and side is written.

EXAMPLES:
  xlsforge --excel_path=design/tables --client_output=client/data --server_output=server/data
  xlsforge --excel_path=design/tables --find_sheet=物品表
  xlsforge --excel_path=tables --client_output=c --server_output=s --export_config=export.yaml

LOGGING:
  RUST_LOG=xlsforge=debug xlsforge ...")]
#[command(version)]
struct Cli {
    /// Directory scanned recursively for workbooks
    #[arg(long = "excel_path")]
    excel_path: Option<PathBuf>,

    /// Print the workbook that owns this sheet instead of compiling
    #[arg(long = "find_sheet")]
    find_sheet: Option<String>,

    /// Directory receiving the client Lua files
    #[arg(long = "client_output")]
    client_output: Option<PathBuf>,

    /// Directory receiving the server Lua files
    #[arg(long = "server_output")]
    server_output: Option<PathBuf>,

    /// YAML export map (sheet → c/s → file name); replaces the builtin map and its hooks
    #[arg(long = "export_config")]
    export_config: Option<PathBuf>,

    /// Scratch directory output is staged in before it is published
    #[arg(long = "staging_dir", default_value = cli::DEFAULT_STAGING_DIR)]
    staging_dir: PathBuf,
}

fn run(args: Cli) -> CompileResult<()> {
    let excel_path = args
        .excel_path
        .ok_or_else(|| CompileError::Config("--excel_path is required".to_string()))?;

    if let Some(name) = args.find_sheet {
        return cli::find_sheet(&excel_path, &name);
    }

    let (Some(client_output), Some(server_output)) = (args.client_output, args.server_output)
    else {
        return Err(CompileError::Config(
            "--client_output and --server_output are required unless --find_sheet is given"
                .to_string(),
        ));
    };

    cli::compile(
        &excel_path,
        &client_output,
        &server_output,
        args.export_config.as_deref(),
        &args.staging_dir,
    )?;
    println!("{}", "SUCCESS!!!!".bold().green());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xlsforge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".bold().red(), e);
            eprintln!("{}", "FAILED!!!!".bold().red());
            ExitCode::FAILURE
        }
    }
}
