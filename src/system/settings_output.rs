use crate::app::RunSettings;

pub(crate) fn settings_lines(settings: &RunSettings) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "client interval(ms): {}",
        settings.probe.interval.as_millis()
    ));
    lines.push(format!(
        "session lifetime(s): {}",
        settings.probe.lifetime.as_secs()
    ));
    lines.push(format!("number of clients: {}", settings.clients));
    lines.push(format!("slow start of sessions: {}", settings.slow_start));
    lines.push(format!("URL to fetch: {}", settings.probe.url));
    lines.push(format!(
        "disable compression: {}",
        settings.probe.disable_compression
    ));
    lines.push(format!(
        "report interval(ms): {}",
        settings.report_interval.as_millis()
    ));
    lines.push(format!(
        "request timeout(ms): {}",
        settings
            .probe
            .timeout
            .map_or_else(|| "none".to_owned(), |timeout| timeout.as_millis().to_string())
    ));
    lines.push(format!("output format: {}", settings.output_format.as_str()));
    lines.push(format!(
        "output: {}",
        settings.output.as_deref().unwrap_or("stdout")
    ));
    lines
}
