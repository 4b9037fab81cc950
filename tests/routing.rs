mod common;

use common::{temp_dir, write};
use convention_mvc::{AppError, ConfigError, RouteIndex};

#[test]
fn builds_trie_from_directory_layout() {
    let base = temp_dir("routes");
    let controllers = base.join("controllers");
    let views = base.join("views");
    write(&controllers, "index.get", "");
    write(&controllers, "users.get", "");
    write(&controllers, "users/new.get", "");
    write(&controllers, "users/${id}.get", "");
    write(&controllers, "users/${id}/edit.post", "");
    write(&controllers, ".hidden/secret.get", "");
    write(&views, "about.html", "");
    write(&views, "users/${id}.html", "");

    let routes = RouteIndex::build(&[controllers, views, base.join("missing")], "/index").unwrap();

    let m = routes.resolve("/users/42/edit").unwrap();
    assert_eq!(m.path, "/users/${id}/edit");
    assert_eq!(m.captures, vec![("id".to_string(), "42".to_string())]);
    assert_eq!(routes.resolve("/users/new").unwrap().path, "/users/new");
    assert_eq!(routes.resolve("/about").unwrap().path, "/about");
    assert_eq!(routes.resolve("/").unwrap().path, "/index");
    assert!(matches!(routes.resolve("/.hidden/secret"), Err(AppError::NotFound(_))));
    assert!(matches!(routes.resolve("/users/1/delete"), Err(AppError::NotFound(_))));

    std::fs::remove_dir_all(base).ok();
}

#[test]
fn rejects_two_capture_names_in_one_directory() {
    let base = temp_dir("conflict");
    write(&base, "users/${id}/show.get", "");
    write(&base, "users/${name}/edit.get", "");
    let err = RouteIndex::build(&[base.clone()], "/index").unwrap_err();
    assert!(matches!(err, ConfigError::ConflictingCapture { .. }));
    std::fs::remove_dir_all(base).ok();
}
