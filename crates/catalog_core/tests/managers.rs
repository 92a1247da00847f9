use catalog_core::manager::{
    AddBuildingQuery, AddCategoryQuery, AddCompanyQuery, BuildingManager, CategoryManager,
    CompanyManager, GetBuildingsQuery, GetCategoriesQuery, GetCompaniesQuery, NewCategory,
    NewCompany,
};
use catalog_core::repo::{
    BuildingFilter, BuildingRepository, SqliteCategoryRepository, SqliteCompanyRepository,
};
use catalog_core::{
    Building, CategoryPath, Client, Deadline, QueryOutcome, RepoError, RepoResult, StreamError,
    TraceId, ValidationError, MAX_LIMIT,
};
use std::sync::{Arc, Mutex};

/// Records what the manager hands down and replays a canned result.
#[derive(Default)]
struct FakeBuildings {
    inserted: Mutex<Vec<Building>>,
    filters: Mutex<Vec<BuildingFilter>>,
    rows: Vec<Building>,
    fail_with_duplicate: bool,
}

impl BuildingRepository for FakeBuildings {
    fn insert(&self, _deadline: &Deadline, building: &Building) -> RepoResult<()> {
        if self.fail_with_duplicate {
            return Err(RepoError::Duplicate {
                detail: "UNIQUE constraint failed: buildings.id".to_string(),
            });
        }
        self.inserted.lock().unwrap().push(building.clone());
        Ok(())
    }

    fn query<E>(
        &self,
        _deadline: &Deadline,
        filter: &BuildingFilter,
        mut visit: impl FnMut(Building) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        self.filters.lock().unwrap().push(filter.clone());
        let mut outcome = QueryOutcome::default();
        for building in self.rows.iter().take(filter.limit.get() as usize) {
            if let Err(err) = visit(building.clone()) {
                return Err(StreamError::Aborted(err));
            }
            outcome.delivered += 1;
        }
        outcome.has_more = self.rows.len() > outcome.delivered;
        Ok(outcome)
    }
}

fn trace() -> TraceId {
    TraceId::new("trace-test")
}

#[test]
fn add_building_stamps_id_and_timestamp() {
    let repo = Arc::new(FakeBuildings::default());
    let manager = BuildingManager::new(Arc::clone(&repo));

    let query = AddBuildingQuery::from_json(trace(), br#"{"address":"  1 Main Street "}"#).unwrap();
    let building = manager.add(&Deadline::none(), query).unwrap();

    assert!(!building.id.is_nil());
    assert!(building.created_at > 0);
    assert_eq!(building.address, "1 Main Street");
    assert_eq!(repo.inserted.lock().unwrap().as_slice(), &[building]);
}

#[test]
fn repository_errors_pass_through_with_trace_id() {
    let repo = FakeBuildings {
        fail_with_duplicate: true,
        ..FakeBuildings::default()
    };
    let manager = BuildingManager::new(repo);

    let query = AddBuildingQuery::from_json(trace(), br#"{"address":"x"}"#).unwrap();
    let err = manager.add(&Deadline::none(), query).unwrap_err();
    assert_eq!(err.trace_id(), &trace());
    assert!(matches!(err.kind(), RepoError::Duplicate { .. }));
    assert!(err.to_string().contains("trace_id=trace-test"));
}

#[test]
fn malformed_payload_is_validation() {
    let err = AddBuildingQuery::from_json(trace(), b"{not json").unwrap_err();
    assert!(matches!(
        err.kind(),
        RepoError::Validation(ValidationError::Payload(_))
    ));
}

#[test]
fn get_normalizes_non_positive_limits() {
    let repo = Arc::new(FakeBuildings::default());
    let manager = BuildingManager::new(Arc::clone(&repo));

    for limit in [None, Some(0), Some(-5), Some(500)] {
        let query = GetBuildingsQuery {
            limit,
            ..GetBuildingsQuery::new(trace())
        };
        manager
            .get(&Deadline::none(), &query, |_| Ok::<(), ()>(()))
            .unwrap();
    }
    let query = GetBuildingsQuery {
        limit: Some(7),
        address: Some("Main".to_string()),
        from_date: Some(10),
        ..GetBuildingsQuery::new(trace())
    };
    manager
        .get(&Deadline::none(), &query, |_| Ok::<(), ()>(()))
        .unwrap();

    let filters = repo.filters.lock().unwrap();
    let limits: Vec<u32> = filters.iter().map(|filter| filter.limit.get()).collect();
    assert_eq!(limits, vec![MAX_LIMIT, MAX_LIMIT, MAX_LIMIT, MAX_LIMIT, 7]);
    assert_eq!(filters[4].address.as_deref(), Some("Main"));
    assert_eq!(filters[4].created.from, Some(10));
    assert_eq!(filters[4].created.to, None);
}

#[test]
fn get_returns_visitor_error_unchanged() {
    let repo = FakeBuildings {
        rows: vec![Building::new("a"), Building::new("b"), Building::new("c")],
        ..FakeBuildings::default()
    };
    let manager = BuildingManager::new(repo);

    let mut seen = 0;
    let result = manager.get(&Deadline::none(), &GetBuildingsQuery::new(trace()), |_| {
        seen += 1;
        Err("client went away")
    });
    match result {
        Err(StreamError::Aborted(err)) => assert_eq!(err, "client went away"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(seen, 1);
}

#[test]
fn get_reports_has_more_from_repository() {
    let repo = FakeBuildings {
        rows: vec![Building::new("a"), Building::new("b"), Building::new("c")],
        ..FakeBuildings::default()
    };
    let manager = BuildingManager::new(repo);

    let query = GetBuildingsQuery {
        limit: Some(2),
        ..GetBuildingsQuery::new(trace())
    };
    let outcome = manager
        .get(&Deadline::none(), &query, |_| Ok::<(), ()>(()))
        .unwrap();
    assert_eq!(outcome.delivered, 2);
    assert!(outcome.has_more);
}

fn sqlite_managers() -> (
    CategoryManager<Arc<SqliteCategoryRepository>>,
    CompanyManager<SqliteCompanyRepository>,
) {
    let client = Client::open_in_memory(&Deadline::none()).unwrap();
    let categories = Arc::new(SqliteCategoryRepository::try_new(client.clone()).unwrap());
    let companies = SqliteCompanyRepository::try_new(client, categories.clone()).unwrap();
    (CategoryManager::new(categories), CompanyManager::new(companies))
}

fn add_category(manager: &CategoryManager<Arc<SqliteCategoryRepository>>, name: &str) {
    let query = AddCategoryQuery {
        trace_id: trace(),
        payload: NewCategory {
            name: name.to_string(),
        },
    };
    manager.add(&Deadline::none(), query).unwrap();
}

#[test]
fn category_manager_rejects_bad_paths_before_storage() {
    let (categories, _) = sqlite_managers();

    let query = AddCategoryQuery {
        trace_id: trace(),
        payload: NewCategory {
            name: "food..cafe".to_string(),
        },
    };
    let err = categories.add(&Deadline::none(), query).unwrap_err();
    assert!(matches!(
        err.kind(),
        RepoError::Validation(ValidationError::InvalidPath { .. })
    ));
    assert!(categories.is_empty(&Deadline::none(), &trace()).unwrap());

    let query = GetCategoriesQuery {
        under: Some("bad path".to_string()),
        ..GetCategoriesQuery::new(trace())
    };
    let result = categories.get(&Deadline::none(), &query, |_| Ok::<(), ()>(()));
    match result {
        Err(StreamError::Failed(err)) => {
            assert!(matches!(err.kind(), RepoError::Validation(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn category_manager_lists_subtree() {
    let (categories, _) = sqlite_managers();
    for name in ["root", "root.a", "root.b", "other"] {
        add_category(&categories, name);
    }

    let query = GetCategoriesQuery {
        under: Some("root".to_string()),
        ..GetCategoriesQuery::new(trace())
    };
    let mut found = Vec::new();
    categories
        .get(&Deadline::none(), &query, |category| {
            found.push(category.name);
            Ok::<(), ()>(())
        })
        .unwrap();
    found.sort();
    let expected: Vec<CategoryPath> = ["root", "root.a", "root.b"]
        .into_iter()
        .map(|name| CategoryPath::parse(name).unwrap())
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn company_manager_resolves_references() {
    let (categories, companies) = sqlite_managers();
    add_category(&categories, "food");
    add_category(&categories, "food.cafe");

    let body = br#"{"name":"Corner Cafe","phone_numbers":[" +1 555 0100 "],"categories":["food.cafe"]}"#;
    let query = AddCompanyQuery::from_json(trace(), body).unwrap();
    let company = companies.add(&Deadline::none(), query).unwrap();
    assert_eq!(company.phone_numbers, vec!["+1 555 0100"]);

    let query = AddCompanyQuery {
        trace_id: trace(),
        payload: NewCompany {
            name: "Garage".to_string(),
            phone_numbers: Vec::new(),
            categories: vec!["auto".to_string()],
        },
    };
    let err = companies.add(&Deadline::none(), query).unwrap_err();
    assert!(matches!(err.kind(), RepoError::Reference { .. }));

    let query = GetCompaniesQuery {
        category: Some("food".to_string()),
        ..GetCompaniesQuery::new(trace())
    };
    let mut found = Vec::new();
    let outcome = companies
        .get(&Deadline::none(), &query, |company| {
            found.push(company);
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(outcome.delivered, 1);
    assert_eq!(found, vec![company]);
}

#[test]
fn category_is_empty_failure_keeps_trace_id() {
    let client = Client::open_in_memory(&Deadline::none()).unwrap();
    let repo = Arc::new(SqliteCategoryRepository::try_new(client).unwrap());
    let manager = CategoryManager::new(Arc::clone(&repo));
    assert!(manager.is_empty(&Deadline::none(), &trace()).unwrap());

    repo.stop(&Deadline::none()).unwrap();
    let err = manager.is_empty(&Deadline::none(), &trace()).unwrap_err();
    assert_eq!(err.trace_id(), &trace());
    assert!(matches!(err.kind(), RepoError::Storage));
}
