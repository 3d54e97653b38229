use std::path::Path;

#[test]
fn demo_projects_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/projects");
    let demos = [
        "01_btx_simulate.yaml",
        "02_binary_optimize.yaml",
        "03_heterogeneous_nrtl.yaml",
    ];

    for name in demos {
        let path = root.join(name);
        let project = dc_project::load_yaml(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        dc_project::validate_project(&project)
            .unwrap_or_else(|e| panic!("Failed to validate {}: {}", name, e));
    }
}
