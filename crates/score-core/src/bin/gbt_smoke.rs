use clap::Parser;
use score_core::config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Load the GBT model and score one synthetic row")]
struct Args {
    /// artifact 目录（columns_order.* / gbt_model.json*）
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// 显式指定列顺序文件
    #[arg(long)]
    columns: Option<PathBuf>,

    /// 显式指定模型文件
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON 配置（只写需要覆盖的字段）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 额外打印构造出来的样例行
    #[arg(long, default_value_t = false)]
    print_row: bool,
}

fn main() -> anyhow::Result<()> {
    // 日志走 stderr，stdout 只留结果；默认 warn，RUST_LOG 可调
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(p) => Config::from_file(p)?,
        None => Config::default(),
    };
    if let Some(dir) = args.model_dir {
        cfg.model_dir = dir;
    }
    if args.columns.is_some() {
        cfg.columns_path = args.columns;
    }
    if args.model.is_some() {
        cfg.model_path = args.model;
    }
    tracing::debug!(?cfg, "smoke config");

    let report = score_core::smoke::run(&cfg)?;

    for line in report.summary_lines() {
        println!("{line}");
    }
    if args.print_row {
        println!("{}", serde_json::to_string_pretty(&report.row.to_json())?);
    }

    Ok(())
}
