use std::sync::Arc;

use super::*;
use crate::log::NullLogger;

fn empty_scene() -> Scene {
    Scene::new(64, Arc::new(NullLogger))
}

#[test]
fn creates_cycle_detects_ancestor_walk() {
    let mut scene = empty_scene();
    let root = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    let child = scene.attach_node(Some(root), Transform::default(), Attachment::None).unwrap();
    let grandchild = scene.attach_node(Some(child), Transform::default(), Attachment::None).unwrap();

    // grandchild's ancestor chain is grandchild -> child -> root, so making
    // root a child of grandchild would close a cycle.
    assert!(scene.creates_cycle(grandchild, root));
    // child is not an ancestor of a fresh sibling node.
    let sibling = scene.attach_node(Some(root), Transform::default(), Attachment::None).unwrap();
    assert!(!scene.creates_cycle(child, sibling));
}

#[test]
fn link_rejects_self_parenting_and_cycles() {
    let mut scene = empty_scene();
    let root = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    let child = scene.attach_node(Some(root), Transform::default(), Attachment::None).unwrap();

    assert!(!scene.link(root, root), "a node cannot be its own parent");
    assert!(!scene.link(child, root), "child cannot become its own ancestor's parent");
    // root keeps its original single child; the rejected link must not have
    // mutated the tree.
    assert_eq!(scene.node(root).unwrap().children(), &[child]);
}

#[test]
fn link_reparents_and_detaches_from_old_parent() {
    let mut scene = empty_scene();
    let a = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    let b = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    let leaf = scene.attach_node(Some(a), Transform::default(), Attachment::None).unwrap();

    assert!(scene.link(b, leaf));
    assert_eq!(scene.node(a).unwrap().children(), &[] as &[NodeHandle]);
    assert_eq!(scene.node(b).unwrap().children(), &[leaf]);
    assert_eq!(scene.node(leaf).unwrap().parent(), Some(b));
}
