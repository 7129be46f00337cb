use mannequin_viewer::{config::ViewerConfig, flow};

fn main() -> anyhow::Result<()> {
    flow::run(ViewerConfig::from_env())
}
