use anyhow::Context;
use serde::Serialize;
use zfs_exporter_operator::clienv;
use zfs_exporter_operator::layout::Layout;
use zfs_exporter_operator::state_store::{ControllerRecord, StateStore};

#[derive(Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    record: &'a ControllerRecord,
    scrape_port: Option<u16>,
    binary_present: bool,
    unit_present: bool,
    sysconfig_present: bool,
}

pub(crate) fn cmd_status(json: bool) -> anyhow::Result<()> {
    let layout = Layout::under(clienv::root_dir());
    let store = StateStore::new(clienv::state_dir());
    let record = store
        .load()
        .with_context(|| format!("failed to read {}", store.path().display()))?;

    let report = StatusReport {
        record: &record,
        scrape_port: record.runtime_config.as_ref().and_then(|c| c.port().ok()),
        binary_present: layout.binary.is_file(),
        unit_present: layout.unit_file.is_file(),
        sysconfig_present: layout.sysconfig_file.is_file(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let or_none = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    let present = |b: bool| if b { "present" } else { "missing" };

    println!("State:            {}", record.state);
    println!("Installed:        {}", or_none(record.installed_version.clone()));
    println!(
        "Listen address:   {}",
        or_none(record.runtime_config.as_ref().map(|c| c.listen_address.clone()))
    );
    println!(
        "Scrape port:      {}",
        or_none(report.scrape_port.map(|p| p.to_string()))
    );
    println!(
        "Last status:      {}",
        or_none(record.last_status.as_ref().map(ToString::to_string))
    );
    println!("Binary:           {} ({})", layout.binary.display(), present(report.binary_present));
    println!("Unit:             {} ({})", layout.unit_file.display(), present(report.unit_present));
    println!(
        "Sysconfig:        {} ({})",
        layout.sysconfig_file.display(),
        present(report.sysconfig_present)
    );
    println!("State file:       {}", store.path().display());
    Ok(())
}
