use clap::Parser;

fn main() {
    let cli = lxctl::Cli::parse();
    if let Err(err) = lxctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
