//! wptagent-image binary entry point

fn main() -> anyhow::Result<()> {
    wptagent_image::run()
}
