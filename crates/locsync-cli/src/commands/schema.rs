use std::fs;
use std::path::PathBuf;

pub fn run_schema(out_dir: PathBuf) -> color_eyre::Result<()> {
    fs::create_dir_all(&out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(locsync_domain::RunSummary, "run_summary.schema.json");
    dump!(locsync_domain::TaskReport, "task_report.schema.json");
    dump!(locsync_domain::PlanReport, "plan_report.schema.json");
    dump!(locsync_domain::WatchPatternReport, "watch_pattern_report.schema.json");
    crate::ui_ok!("schemas written to {}", out_dir.display());
    Ok(())
}
