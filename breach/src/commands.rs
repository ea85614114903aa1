use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    let scan = command!("scan")
        .about(
            "Crawl a target for forms and API calls, then probe them for SQL, NoSQL and \
            authentication weaknesses. Findings are appended to a CSV report.",
        )
        .arg(
            arg!(-u --"url" <URL>)
                .required(true)
                .help("The target URL; the crawl never leaves its host"),
        )
        .arg(
            arg!(-t --"token" <TOKEN>)
                .required(false)
                .help("Bearer token sent with every request"),
        )
        .arg(
            arg!(-d --"depth" <DEPTH>)
                .required(false)
                .help("Maximum link depth to crawl")
                .value_parser(clap::value_parser!(usize))
                .default_value("2"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("CSV report to append findings to")
                .default_value("scan_report.csv"),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .help("History database (default: ~/.config/breach/breach.db when initialized)"),
        )
        .arg(
            arg!(--"delay-threshold" <MS>)
                .required(false)
                .help("Response latency in milliseconds that counts as a timing signal")
                .value_parser(clap::value_parser!(u64))
                .default_value("2000"),
        )
        .arg(
            arg!(-v --"verbose")
                .required(false)
                .help("Show debug logging")
                .action(clap::ArgAction::SetTrue),
        );

    #[cfg(feature = "browser")]
    let scan = scan.arg(
        arg!(--"browser")
            .required(false)
            .help("Render pages in headless Chromium and capture XHR/fetch traffic")
            .action(clap::ArgAction::SetTrue),
    );

    clap::Command::new("breach")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("breach")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the breach history database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the breach database")
                        .default_value("~/.config/breach/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Forces the overwriting of any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(scan)
        .subcommand(
            command!("history")
                .about("List past scans, or the findings of one scan")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("History database to read")
                        .default_value("~/.config/breach/breach.db"),
                )
                .arg(
                    arg!(-s --"session" <ID>)
                        .required(false)
                        .help("Show the findings recorded for this session"),
                ),
        )
}
