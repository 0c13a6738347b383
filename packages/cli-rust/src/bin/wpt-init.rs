//! wpt-init binary entry point

fn main() {
    std::process::exit(wptagent_image::run_init());
}
