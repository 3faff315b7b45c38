use indextree::NodeId;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use treedeco::config::{DecorationConfig, DEFAULT_CONFIG_FILE};
use treedeco::crawler::FileCrawler;
use treedeco::render::{decorated_rows, DecoratedRow, DirtyRows};
use treedeco::tree::FileTree;
use treedeco::DecorationsManager;

const CONFIG: &str = r#"
[[decoration]]
name = "sources"
classnames = ["src"]
targets = [{ path = "src", mode = "self_and_children" }]
negations = [{ path = "src/bin", mode = "self_and_children" }]

[[decoration]]
name = "docs"
classnames = ["doc"]
targets = [{ path = "README.md", mode = "self" }]
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/bin")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "").unwrap();
    fs::write(dir.path().join("src/bin/cli.rs"), "").unwrap();
    fs::write(dir.path().join("tests/it.rs"), "").unwrap();
    fs::write(dir.path().join("README.md"), "").unwrap();
    fs::write(dir.path().join(DEFAULT_CONFIG_FILE), CONFIG).unwrap();
    dir
}

fn load(root: &Path) -> (FileTree, DecorationsManager<NodeId>) {
    let (nodes, _) = FileCrawler::new().scan(root);
    let tree = FileTree::from_scan(root, &nodes);
    let mut manager = DecorationsManager::new();
    tree.register_with(&mut manager).unwrap();

    let config = DecorationConfig::load_from_path(root.join(DEFAULT_CONFIG_FILE))
        .unwrap()
        .unwrap();
    for spec in &config.decorations {
        manager.add_decoration(spec.build(|path| tree.resolve(path)));
    }
    (tree, manager)
}

/// Lines below the root, without the root's own (temporary) name.
fn lines(tree: &FileTree, manager: &DecorationsManager<NodeId>) -> Vec<String> {
    decorated_rows(tree, manager, None)
        .iter()
        .skip(1)
        .map(DecoratedRow::display_line)
        .collect()
}

#[test]
fn config_decorations_show_up_in_rows() {
    let dir = project();
    let (tree, manager) = load(dir.path());

    assert_eq!(
        lines(&tree, &manager),
        vec![
            "  .treedeco.toml",
            "  README.md [doc]",
            "  src/ [src]",
            "    bin/",
            "      cli.rs",
            "    lib.rs [src]",
            "  tests/",
            "    it.rs",
        ]
    );
}

#[test]
fn disabling_by_name_clears_rows() {
    let dir = project();
    let (tree, mut manager) = load(dir.path());
    let rows = decorated_rows(&tree, &manager, None);
    let dirty = DirtyRows::watch(&rows, &manager);

    let sources = manager.find_decoration("sources").unwrap();
    assert!(manager.disable(sources));

    let changed: Vec<String> = dirty.drain().into_iter().map(|idx| rows[idx].name.clone()).collect();
    assert_eq!(changed, vec!["src", "lib.rs"]);
    assert!(lines(&tree, &manager).iter().all(|line| !line.contains("[src]")));
}

#[test]
fn moved_nodes_follow_their_new_parent() {
    let dir = project();
    let (mut tree, mut manager) = load(dir.path());
    let lib = tree.resolve(Path::new("src/lib.rs")).unwrap();
    let tests = tree.resolve(Path::new("tests")).unwrap();
    let bin = tree.resolve(Path::new("src/bin")).unwrap();

    assert!(tree.move_node(lib, tests));
    manager.reparent(lib, tests).unwrap();
    assert!(manager.applicable_classlist(&lib).unwrap().is_empty());

    let it = tree.resolve(Path::new("tests/it.rs")).unwrap();
    assert!(tree.move_node(it, bin));
    manager.reparent(it, bin).unwrap();
    assert!(manager.applicable_classlist(&it).unwrap().is_empty());

    assert!(tree.move_node(bin, tests));
    manager.reparent(bin, tests).unwrap();
    // the negation travels with bin, and nothing above it applies any more
    assert!(manager.applicable_classlist(&bin).unwrap().is_empty());
    assert_eq!(tree.resolve(Path::new("tests/bin/it.rs")), Some(it));
}

#[test]
fn removed_nodes_leave_the_manager() {
    let dir = project();
    let (mut tree, mut manager) = load(dir.path());
    let src = tree.resolve(Path::new("src")).unwrap();
    let cli = tree.resolve(Path::new("src/bin/cli.rs")).unwrap();

    assert!(tree.remove_node(src));
    manager.destroy_composite_pair(src);
    assert!(!manager.contains_target(&src));
    assert!(!manager.contains_target(&cli));

    let sources = manager.find_decoration("sources").unwrap();
    let removed = manager.remove_decoration(sources).unwrap();
    assert_eq!(removed.name(), "sources");
    assert_eq!(lines(&tree, &manager).len(), 4);
}
