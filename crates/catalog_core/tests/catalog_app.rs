use catalog_core::manager::{
    AddBuildingQuery, AddCompanyQuery, GetBuildingsQuery, GetCategoriesQuery, GetCompaniesQuery,
};
use catalog_core::{BootstrapError, Catalog, Config, Deadline, RepoError, TraceId};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn seeded_config(db_path: &str) -> Config {
    Config::from_toml_str(&format!(
        r#"
        [db]
        path = "{db_path}"

        [seed]
        categories = ["food", "food.cafe", "auto"]
        "#
    ))
    .unwrap()
}

fn category_count(catalog: &Catalog) -> usize {
    catalog
        .categories()
        .get(
            &Deadline::none(),
            &GetCategoriesQuery::new(TraceId::generate()),
            |_| Ok::<(), ()>(()),
        )
        .unwrap()
        .delivered
}

#[test]
fn seed_runs_only_on_empty_store() {
    let catalog = Catalog::open(&seeded_config(":memory:")).unwrap();

    assert_eq!(catalog.seed_if_empty(&Deadline::none()).unwrap(), 3);
    assert_eq!(catalog.seed_if_empty(&Deadline::none()).unwrap(), 0);
    assert_eq!(category_count(&catalog), 3);

    catalog.stop(&Deadline::none()).unwrap();
    catalog.stop(&Deadline::none()).unwrap();
}

#[test]
fn companies_see_categories_through_shared_wiring() {
    let catalog = Catalog::open(&seeded_config(":memory:")).unwrap();
    catalog.seed_if_empty(&Deadline::none()).unwrap();

    let query = AddCompanyQuery::from_json(
        TraceId::new("app-test"),
        br#"{"name":"Bean There","categories":["food.cafe"]}"#,
    )
    .unwrap();
    catalog.companies().add(&Deadline::none(), query).unwrap();

    let query = AddCompanyQuery::from_json(
        TraceId::new("app-test"),
        br#"{"name":"Nowhere","categories":["travel"]}"#,
    )
    .unwrap();
    let err = catalog.companies().add(&Deadline::none(), query).unwrap_err();
    assert!(matches!(err.kind(), RepoError::Reference { .. }));

    let query = GetCompaniesQuery {
        category: Some("food".to_string()),
        ..GetCompaniesQuery::new(TraceId::new("app-test"))
    };
    let outcome = catalog
        .companies()
        .get(&Deadline::none(), &query, |_| Ok::<(), ()>(()))
        .unwrap();
    assert_eq!(outcome.delivered, 1);
}

#[test]
fn visitor_can_query_categories_while_companies_stream() {
    let catalog = Catalog::open(&seeded_config(":memory:")).unwrap();
    catalog.seed_if_empty(&Deadline::none()).unwrap();
    for body in [
        &br#"{"name":"Bean There","categories":["food.cafe"]}"#[..],
        &br#"{"name":"Lube Stop","categories":["auto"]}"#[..],
    ] {
        let query = AddCompanyQuery::from_json(TraceId::new("app-test"), body).unwrap();
        catalog.companies().add(&Deadline::none(), query).unwrap();
    }

    let mut resolved = Vec::new();
    let outcome = catalog
        .companies()
        .get(
            &Deadline::none(),
            &GetCompaniesQuery::new(TraceId::new("app-test")),
            |company| {
                let query = GetCategoriesQuery {
                    name: Some(company.categories[0].to_string()),
                    ..GetCategoriesQuery::new(TraceId::new("app-test"))
                };
                let nested = catalog
                    .categories()
                    .get(
                        &Deadline::after(Duration::from_secs(5)),
                        &query,
                        |category| {
                            resolved.push(category.name.to_string());
                            Ok::<(), ()>(())
                        },
                    )
                    .map_err(|_| "nested category query failed")?;
                assert_eq!(nested.delivered, 1);
                Ok::<(), &str>(())
            },
        )
        .unwrap();
    assert_eq!(outcome.delivered, 2);
    resolved.sort();
    assert_eq!(resolved, vec!["auto", "food.cafe"]);
}

#[test]
fn insert_is_not_held_up_by_a_slow_reader() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let catalog = Catalog::open(&seeded_config(&db_path.to_string_lossy())).unwrap();
    let query = AddBuildingQuery::from_json(TraceId::new("app-test"), br#"{"address":"1 Main"}"#)
        .unwrap();
    catalog.buildings().add(&Deadline::none(), query).unwrap();

    thread::scope(|scope| {
        let (streaming_tx, streaming_rx) = mpsc::channel();
        let reader = scope.spawn(|| {
            catalog
                .buildings()
                .get(
                    &Deadline::none(),
                    &GetBuildingsQuery::new(TraceId::new("app-test")),
                    move |_| {
                        streaming_tx.send(()).unwrap();
                        thread::sleep(Duration::from_millis(800));
                        Ok::<(), ()>(())
                    },
                )
                .unwrap()
        });
        streaming_rx.recv().unwrap();

        let started_at = Instant::now();
        let query =
            AddBuildingQuery::from_json(TraceId::new("app-test"), br#"{"address":"2 Main"}"#)
                .unwrap();
        catalog
            .buildings()
            .add(&Deadline::after(Duration::from_millis(100)), query)
            .unwrap();
        assert!(started_at.elapsed() < Duration::from_millis(600));

        assert_eq!(reader.join().unwrap().delivered, 1);
    });
    catalog.stop(&Deadline::none()).unwrap();
}

#[test]
fn file_database_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = seeded_config(&db_path.to_string_lossy());

    let catalog = Catalog::open(&config).unwrap();
    assert_eq!(catalog.seed_if_empty(&Deadline::none()).unwrap(), 3);
    catalog.stop(&Deadline::none()).unwrap();

    let reopened = Catalog::open(&config).unwrap();
    assert_eq!(reopened.seed_if_empty(&Deadline::none()).unwrap(), 0);
    assert_eq!(category_count(&reopened), 3);
    reopened.stop(&Deadline::none()).unwrap();
}

#[test]
fn invalid_config_fails_bootstrap() {
    let mut config = Config::default();
    config.seed.categories = vec!["bad..path".to_string()];
    assert!(matches!(
        Catalog::open(&config),
        Err(BootstrapError::Config(_))
    ));
}

#[test]
fn unreachable_database_fails_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.db.path = dir
        .path()
        .join("missing")
        .join("catalog.db")
        .to_string_lossy()
        .into_owned();
    assert!(matches!(
        Catalog::open(&config),
        Err(BootstrapError::Connect(_))
    ));
}
