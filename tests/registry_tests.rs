use admin_shell::{
    registry::{RegistryError, ResourceDescriptor, ResourceRegistry},
    resolver::RouteTable,
};

fn descriptor(name: &str) -> ResourceDescriptor {
    ResourceDescriptor::crud(name, name, name, true)
}

#[test]
fn test_builtin_registry_lists_blog_posts_first() {
    let registry = ResourceRegistry::builtin().unwrap();

    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["blog_posts", "categories"]);
    assert_eq!(registry.default_resource().name, "blog_posts");
    assert_eq!(registry.default_path(), "/blog-posts");
}

#[test]
fn test_builtin_resources_are_deletable_with_all_paths() {
    let registry = ResourceRegistry::builtin().unwrap();

    for resource in registry.iter() {
        assert!(resource.can_delete);
        assert!(resource.list_path.is_some());
        assert!(resource.create_path.is_some());
        assert!(resource.edit_path.is_some());
        assert!(resource.show_path.is_some());
    }

    let categories = registry.get("categories").unwrap();
    assert_eq!(categories.edit_url("7").as_deref(), Some("/categories/edit/7"));
    assert_eq!(categories.show_url("7").as_deref(), Some("/categories/show/7"));
}

#[test]
fn test_lookup_of_unregistered_name() {
    let registry = ResourceRegistry::builtin().unwrap();
    assert!(registry.get("todos").is_none());
    assert!(!registry.contains("users"));
}

#[test]
fn test_menu_skips_resources_without_list_screen() {
    let mut hidden = descriptor("audit");
    hidden.can_delete = false;
    hidden.list_path = None;

    let registry = ResourceRegistry::new(vec![descriptor("posts"), hidden]).unwrap();
    let menu = registry.menu();

    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0].name, "posts");
    assert_eq!(menu[0].path, "/posts");
}

#[test]
fn test_empty_registry_rejected() {
    assert_eq!(ResourceRegistry::new(vec![]).unwrap_err(), RegistryError::Empty);
}

#[test]
fn test_duplicate_and_empty_names_rejected() {
    let err = ResourceRegistry::new(vec![descriptor("posts"), descriptor("posts")]).unwrap_err();
    assert_eq!(err, RegistryError::Duplicate("posts".to_string()));

    let err = ResourceRegistry::new(vec![descriptor(" ")]).unwrap_err();
    assert_eq!(err, RegistryError::EmptyName);
}

#[test]
fn test_deletable_resource_must_expose_all_paths() {
    let mut partial = descriptor("posts");
    partial.show_path = None;

    let err = ResourceRegistry::new(vec![partial.clone()]).unwrap_err();
    assert_eq!(err, RegistryError::IncompleteDeletable("posts".to_string()));

    // Without delete capability a partial resource is fine.
    partial.can_delete = false;
    assert!(ResourceRegistry::new(vec![partial]).is_ok());
}

#[test]
fn test_templates_need_id_placeholder() {
    let mut broken = descriptor("posts");
    broken.edit_path = Some("/posts/edit".to_string());

    let err = ResourceRegistry::new(vec![broken]).unwrap_err();
    assert!(matches!(err, RegistryError::MissingIdPlaceholder { .. }));
}

#[test]
fn test_route_table_references_only_registered_resources() {
    let registry = ResourceRegistry::builtin().unwrap();
    let table = RouteTable::from_registry(&registry);

    assert!(table.references_only(&registry));
    let other = ResourceRegistry::new(vec![descriptor("posts")]).unwrap();
    assert!(!table.references_only(&other));
    assert_eq!(
        table.verify(&other),
        Err(RegistryError::UnregisteredRoute("blog_posts".to_string()))
    );
}
