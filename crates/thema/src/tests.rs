// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// Writes `<root>/<name>.tpl`, creating parent directories.
fn write_template(root: &Path, name: &str, source: &str) {
    let path = root.join(format!("{}.{}", name, DEFAULT_EXTENSION));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn set_source_mtime(root: &Path, name: &str, time: SystemTime) {
    let path = root.join(format!("{}.{}", name, DEFAULT_EXTENSION));
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

// Helper function to create an engine with memory cache for tests
fn create_engine<P: AsRef<Path>>(root_dir: P) -> Engine<FileSystemResolver> {
    let resolver = FileSystemResolver::new(root_dir);
    Engine::with_memory_cache(resolver, 100)
}

// Helper function to create an engine with file system cache for tests
fn create_engine_with_cache<P: AsRef<Path>, C: AsRef<Path>>(
    root_dir: P,
    cache_dir: C,
) -> Result<Engine<FileSystemResolver>> {
    let resolver = FileSystemResolver::new(root_dir);
    Engine::with_filesystem_cache(resolver, cache_dir, 100)
}

fn base_theme(root: &Path) {
    write_template(
        root,
        "layouts/base",
        "Header {% block content %}DEFAULT{% endblock %} Footer",
    );
    write_template(
        root,
        "pages/home",
        r#"{% extends "layouts/base" %}{% block content %}HELLO{% endblock %}"#,
    );
}

#[cfg(test)]
mod inheritance_tests {
    use super::*;

    #[test]
    fn test_full_and_partial_render() {
        let theme = TempDir::new().unwrap();
        base_theme(theme.path());
        let engine = create_engine(theme.path());
        let mut context = Context::new();

        let full = engine
            .render("pages/home", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(full, "Header HELLO Footer");

        let partial = engine
            .render("pages/home", &mut context, &RenderOptions::partial())
            .unwrap();
        assert_eq!(partial, "HELLO");
    }

    #[test]
    fn test_child_text_outside_blocks_is_discarded() {
        let theme = TempDir::new().unwrap();
        write_template(theme.path(), "layouts/base", "<{% block content %}{% endblock %}>");
        write_template(
            theme.path(),
            "pages/x",
            "{% extends \"layouts/base\" %}\nignored\n{% block content %}kept{% endblock %}\nignored",
        );
        let engine = create_engine(theme.path());
        let mut context = Context::new();
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "<kept>"
        );
    }

    #[test]
    fn test_layout_sees_page_context() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "layouts/base",
            "<title>{% block title %}{% site.name %}{% endblock %}</title><main>{% block content %}{% endblock %}</main>",
        );
        write_template(
            theme.path(),
            "pages/post",
            r#"{% extends "layouts/base" %}
{% block title %}{% post.title %} | {% site.name %}{% endblock %}
{% block content %}{% raw post.body %}{% endblock %}"#,
        );

        let engine = create_engine(theme.path());
        let mut context = Context::from_json(json!({
            "site": { "name": "Blog" },
            "post": { "title": "A & B", "body": "<p>Body</p>" }
        }));
        let html = engine
            .render("pages/post", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(
            html,
            "<title>A &amp; B | Blog</title><main><p>Body</p></main>"
        );
    }

    #[test]
    fn test_missing_parent_is_an_error() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/orphan",
            r#"{% extends "layouts/none" %}{% block content %}x{% endblock %}"#,
        );
        let engine = create_engine(theme.path());
        let mut context = Context::new();

        let result = engine.render("pages/orphan", &mut context, &RenderOptions::default());
        assert!(matches!(result, Err(ThemaError::TemplateNotFound(name)) if name == "layouts/none"));

        // A partial render never needs the parent.
        let partial = engine
            .render("pages/orphan", &mut context, &RenderOptions::partial())
            .unwrap();
        assert_eq!(partial, "x");
    }
}

#[cfg(test)]
mod loop_scope_tests {
    use super::*;

    #[test]
    fn test_loop_variable_does_not_leak_into_include() {
        let theme = TempDir::new().unwrap();
        write_template(theme.path(), "partials/footer", "footer:{% item %}");
        write_template(
            theme.path(),
            "pages/list",
            r#"{% foreach items as item %}{% item %};{% endforeach %}{% include "partials/footer" %}"#,
        );
        let engine = create_engine(theme.path());
        let mut context = Context::from_json(json!({ "items": ["a", "b"] }));

        let html = engine
            .render("pages/list", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(html, "a;b;footer:");
        assert!(!context.contains("item"));
    }

    #[test]
    fn test_nested_loops_restore_outer_variable() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/grid",
            "{% foreach rows as row %}{% foreach row.cells as row %}{% row %}{% endforeach %}/{% row.id %} {% endforeach %}",
        );
        let engine = create_engine(theme.path());
        let mut context = Context::from_json(json!({
            "rows": [
                { "id": 1, "cells": ["a", "b"] },
                { "id": 2, "cells": ["c"] }
            ]
        }));
        let html = engine
            .render("pages/grid", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(html, "ab/1 c/2 ");
    }

    #[test]
    fn test_loop_variable_restored_when_loop_body_fails() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/broken",
            r#"{% foreach items as item %}{% include "partials/missing" %}{% endforeach %}"#,
        );
        let engine = create_engine(theme.path());
        let mut context = Context::from_json(json!({ "items": [1], "item": "before" }));

        assert!(engine
            .render("pages/broken", &mut context, &RenderOptions::default())
            .is_err());
        assert_eq!(context.resolve("item").render_raw(), "before");
    }
}

#[cfg(test)]
mod escaping_tests {
    use super::*;

    #[test]
    fn test_raw_and_escaped_output() {
        let theme = TempDir::new().unwrap();
        write_template(theme.path(), "pages/x", "{% v %}\n{% raw v %}");
        let engine = create_engine(theme.path());
        let mut context = Context::new();
        context.insert("v", "<a href=\"x\">Tom & 'Jerry'</a>");

        let html = engine
            .render("pages/x", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(
            html,
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;\n<a href=\"x\">Tom & 'Jerry'</a>"
        );
    }

    #[test]
    fn test_unknown_tags_and_missing_paths() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/x",
            "[{% some_future_tag arg %}][{% missing.path %}][{% endforeach %}]",
        );
        let engine = create_engine(theme.path());
        let mut context = Context::new();
        let html = engine
            .render("pages/x", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(html, "[{% some_future_tag arg %}][][]");
    }
}

#[cfg(test)]
mod helper_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_translation_with_catalog_and_locale() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/x",
            r#"{% t "greeting" name=user.name %} {% t 'missing.key' %}"#,
        );

        let mut catalogs = CatalogTranslator::new("en");
        catalogs.add_message("en", "greeting", "Hello {name}");
        catalogs.add_message("de", "greeting", "Hallo {name}");
        let helpers = HelperRegistry::with_defaults(&HelperSettings::default(), Arc::new(catalogs));

        let engine = create_engine(theme.path()).with_helpers(helpers);
        let mut context = Context::from_json(json!({ "user": { "name": "<Ada>" } }));

        let en = engine
            .render("pages/x", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(en, "Hello &lt;Ada&gt; missing.key");

        let de = engine
            .render("pages/x", &mut context, &RenderOptions::default().with_locale("de"))
            .unwrap();
        assert_eq!(de, "Hallo &lt;Ada&gt; missing.key");
    }

    #[test]
    fn test_url_and_asset_settings() {
        let theme = TempDir::new().unwrap();
        write_template(
            theme.path(),
            "pages/x",
            r#"<a href="{% url "/blog" %}"><img src="{% asset "img/logo.png" %}">"#,
        );
        let settings = HelperSettings {
            base_url: "https://example.com/".to_string(),
            asset_url: "/themes/default/assets".to_string(),
            asset_version: Some("3".to_string()),
            ..HelperSettings::default()
        };
        let helpers = HelperRegistry::with_defaults(&settings, Arc::new(KeyTranslator));
        let engine = create_engine(theme.path()).with_helpers(helpers);
        let mut context = Context::new();

        let html = engine
            .render("pages/x", &mut context, &RenderOptions::default())
            .unwrap();
        assert_eq!(
            html,
            r#"<a href="https://example.com/blog"><img src="/themes/default/assets/img/logo.png?v=3">"#
        );
    }

    #[test]
    fn test_include_inherits_locale() {
        let theme = TempDir::new().unwrap();
        write_template(theme.path(), "partials/nav", r#"{% t "home" %}"#);
        write_template(theme.path(), "pages/x", r#"{% include "partials/nav" %}"#);

        let mut catalogs = CatalogTranslator::new("en");
        catalogs.add_message("en", "home", "Home");
        catalogs.add_message("fr", "home", "Accueil");
        let helpers = HelperRegistry::with_defaults(&HelperSettings::default(), Arc::new(catalogs));
        let engine = create_engine(theme.path()).with_helpers(helpers);
        let mut context = Context::new();

        let html = engine
            .render("pages/x", &mut context, &RenderOptions::default().with_locale("fr"))
            .unwrap();
        assert_eq!(html, "Accueil");
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn test_artifact_written_under_path_hash() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        base_theme(theme.path());

        let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        let mut context = Context::new();
        engine
            .render("pages/home", &mut context, &RenderOptions::default())
            .unwrap();

        let resource = engine.resolver().resolve("pages/home").unwrap();
        let artifact = cache_dir
            .path()
            .join(format!("{}.json", cache_key(&resource.path)));
        assert!(artifact.is_file());

        let unit: CompiledUnit = serde_json::from_str(&fs::read_to_string(artifact).unwrap()).unwrap();
        assert_eq!(unit.extends.as_deref(), Some("layouts/base"));
        assert!(unit.is_current());

        let leftovers: Vec<_> = fs::read_dir(cache_dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_debug_mode_recompiles_after_source_change() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        write_template(theme.path(), "pages/x", "version one");

        let mut engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        let mut context = Context::new();
        let render = |engine: &Engine<FileSystemResolver>, context: &mut Context| {
            engine
                .render("pages/x", context, &RenderOptions::default())
                .unwrap()
        };

        assert_eq!(render(&engine, &mut context), "version one");

        write_template(theme.path(), "pages/x", "version two");
        set_source_mtime(
            theme.path(),
            "pages/x",
            SystemTime::now() + Duration::from_secs(3600),
        );

        // Production mode trusts the cache.
        assert_eq!(render(&engine, &mut context), "version one");

        engine.set_debug(true);
        assert_eq!(render(&engine, &mut context), "version two");
    }

    #[test]
    fn test_debug_mode_recompiles_when_mtime_moves_backwards() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        write_template(theme.path(), "pages/x", "before");
        let compiled_at = SystemTime::now();
        set_source_mtime(theme.path(), "pages/x", compiled_at);

        let mut engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        engine.set_debug(true);
        let mut context = Context::new();
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "before"
        );

        write_template(theme.path(), "pages/x", "after");
        set_source_mtime(theme.path(), "pages/x", compiled_at - Duration::from_secs(1));
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "after"
        );
    }

    #[test]
    fn test_deleted_template_is_invalidated() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        write_template(theme.path(), "partials/nav", "<nav>");

        let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        engine.load("partials/nav").unwrap();
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 1);

        fs::remove_file(theme.path().join("partials/nav.tpl")).unwrap();
        engine.invalidate("partials/nav").unwrap();
        assert!(!engine.cache_contains("partials/nav"));
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_artifacts_survive_engine_restart() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        write_template(theme.path(), "pages/x", "cached");

        {
            let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
            let mut context = Context::new();
            engine
                .render("pages/x", &mut context, &RenderOptions::default())
                .unwrap();
        }

        write_template(theme.path(), "pages/x", "changed");
        set_source_mtime(
            theme.path(),
            "pages/x",
            SystemTime::now() + Duration::from_secs(3600),
        );

        let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        let mut context = Context::new();
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "cached"
        );

        let debug_engine = create_engine_with_cache(theme.path(), cache_dir.path())
            .unwrap()
            .with_options(EngineOptions {
                debug: true,
                ..EngineOptions::default()
            });
        assert_eq!(
            debug_engine
                .render("pages/x", &mut context, &RenderOptions::default())
                .unwrap(),
            "changed"
        );
    }

    #[test]
    fn test_corrupt_artifact_is_recompiled() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        write_template(theme.path(), "pages/x", "fresh");

        let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        let resource = engine.resolver().resolve("pages/x").unwrap();
        fs::write(
            cache_dir.path().join(format!("{}.json", cache_key(&resource.path))),
            "{ not json",
        )
        .unwrap();

        let mut context = Context::new();
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "fresh"
        );
    }

    #[test]
    fn test_cache_write_failure_does_not_fail_render() {
        let theme = TempDir::new().unwrap();
        let cache_root = TempDir::new().unwrap();
        let cache_dir = cache_root.path().join("units");
        write_template(theme.path(), "pages/x", "still rendered");

        let engine = create_engine_with_cache(theme.path(), &cache_dir).unwrap();
        fs::remove_dir_all(&cache_dir).unwrap();
        fs::write(&cache_dir, "not a directory").unwrap();

        let mut context = Context::new();
        assert_eq!(
            engine.render("pages/x", &mut context, &RenderOptions::default()).unwrap(),
            "still rendered"
        );

        let report = engine.warmup();
        assert_eq!(report.compiled_count, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("pages/x: "));
    }

    #[test]
    fn test_clear_cache_removes_artifacts() {
        let theme = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        base_theme(theme.path());

        let engine = create_engine_with_cache(theme.path(), cache_dir.path()).unwrap();
        let report = engine.warmup();
        assert_eq!(report.compiled_count, 2);
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 2);

        engine.clear_cache().unwrap();
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 0);
        assert!(!engine.cache_contains("pages/home"));
    }
}

#[cfg(test)]
mod warmup_tests {
    use super::*;

    #[test]
    fn test_warmup_filesystem_theme() {
        let theme = TempDir::new().unwrap();
        base_theme(theme.path());
        write_template(theme.path(), "partials/nav", "<nav></nav>");
        write_template(
            theme.path(),
            "pages/about",
            r#"{% extends "layouts/base" %}{% block content %}{% include 'partials/nav' %}{% include "partials/gone" %}{% endblock %}"#,
        );
        fs::write(theme.path().join("README.md"), "not a template").unwrap();

        let engine = create_engine(theme.path());
        let report = engine.warmup();

        assert_eq!(report.compiled_count, 4);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("partials/gone: "));
        assert!(engine.cache_contains("pages/about"));
    }

    #[test]
    fn test_warmup_counts_extension_spellings_once() {
        let theme = TempDir::new().unwrap();
        write_template(theme.path(), "partials/nav", "<nav></nav>");
        write_template(
            theme.path(),
            "pages/home",
            r#"{% include "partials/nav.tpl" %}{% include "partials/nav" %}"#,
        );

        let engine = create_engine(theme.path());
        let report = engine.warmup();
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.compiled_count, 2);
    }

    #[test]
    fn test_warmup_missing_theme_dir() {
        let engine = create_engine("/nonexistent/theme/dir");
        let report = engine.warmup();
        assert_eq!(report.compiled_count, 0);
        assert_eq!(report.errors.len(), 1);
    }
}
