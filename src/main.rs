use std::process;

mod parser;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parser::Options::parse(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{}", parser::USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = parser::run(options) {
        eprintln!("Detection failed: {e:#}");
        process::exit(1);
    }
}
