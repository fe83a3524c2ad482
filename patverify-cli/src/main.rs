//! PatVerify binary: all failure paths converge to exit status 1 after a
//! diagnostic on stderr; full success exits 0.

fn main() {
    if let Err(e) = patverify_cli::run() {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
