use clap::{Parser, ValueEnum};
use reportpress::{ReportConfig, ReportGenerator, Size, TextAlign, sample_rows};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageSizeArg {
    Letter,
    A4,
    A5,
}

impl PageSizeArg {
    fn size(self) -> Size {
        match self {
            PageSizeArg::Letter => Size::LETTER,
            PageSizeArg::A4 => Size::a4(),
            PageSizeArg::A5 => Size::a5(),
        }
    }
}

/// Render a sample tabular report to PDF
#[derive(Parser, Debug)]
#[command(name = "reportpress", version, about)]
struct Args {
    /// Output PDF path
    #[arg(short, long, default_value = "report.pdf")]
    output: PathBuf,

    /// Number of placeholder data rows
    #[arg(long, default_value_t = 100)]
    rows: usize,

    /// Logo drawn along the top edge of pages 2..N, 2in from the right edge
    #[arg(long)]
    left_image: Option<String>,

    /// Logo drawn along the top edge of pages 2..N, near the left edge
    #[arg(long)]
    right_image: Option<String>,

    #[arg(long, value_enum, default_value = "letter")]
    page_size: PageSizeArg,

    /// Alignment of the totals row label: left, center or right
    #[arg(long, value_parser = parse_align, default_value = "left")]
    totals_align: TextAlign,

    /// Repeat the header row at the top of every page
    #[arg(long)]
    repeat_header: bool,

    /// Write JSON-lines lifecycle events to this file
    #[arg(long)]
    debug_log: Option<PathBuf>,
}

fn parse_align(raw: &str) -> Result<TextAlign, String> {
    TextAlign::parse(raw).ok_or_else(|| format!("unknown alignment '{raw}'"))
}

fn run(args: Args) -> Result<usize, reportpress::ReportError> {
    let mut builder = ReportConfig::builder()
        .page_size(args.page_size.size())
        .repeat_header(args.repeat_header)
        .totals_alignment(args.totals_align);
    if let Some(source) = args.left_image {
        builder = builder.left_image(source);
    }
    if let Some(source) = args.right_image {
        builder = builder.right_image(source);
    }
    if let Some(path) = args.debug_log {
        builder = builder.debug_log(path);
    }
    let config = builder.build()?;
    let rows = sample_rows(&config, args.rows);
    let generator = ReportGenerator::new(config)?;
    let metrics = generator.render_to_file(&rows, &args.output)?;
    log::info!(
        "wrote {} ({} pages, {} bytes)",
        args.output.display(),
        metrics.page_count(),
        metrics.total_bytes
    );
    Ok(metrics.page_count())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let output = args.output.clone();
    match run(args) {
        Ok(pages) => {
            println!("{}: {} page(s)", output.display(), pages);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
