use chrono::{Duration, TimeZone, Utc};
use mindflow_core::error::{DomainError, EntityKind};
use mindflow_customers::application::command_handlers::{
    handle_add_contact, handle_add_pricing_tier, handle_create_customer, handle_delete_customer,
    handle_map_external_id, handle_remove_contact, handle_remove_external_id,
    handle_update_contact, handle_update_customer, handle_update_external_id,
    handle_update_pricing_tier,
};
use mindflow_customers::domain::changes::CustomerChange;
use mindflow_customers::domain::commands::{
    AddContact, AddPricingTier, CreateCustomer, DeleteCustomer, DeleteMode, MapExternalId,
    RemoveContact, RemoveExternalId, UpdateContact, UpdateCustomer, UpdateExternalId,
    UpdatePricingTier,
};
use mindflow_customers::domain::entities::{Customer, CustomerType};
use mindflow_test_support::{FailingCustomerRepository, FixedClock, InMemoryCustomerRepository};
use uuid::Uuid;

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
}

async fn create(repo: &InMemoryCustomerRepository, name: &str) -> Customer {
    handle_create_customer(
        &CreateCustomer {
            correlation_id: Uuid::new_v4(),
            customer_name: name.into(),
            customer_type: CustomerType::Production,
            pricing_tier: None,
            notes: None,
        },
        &clock(),
        repo,
    )
    .await
    .unwrap()
}

fn add_contact(customer_id: Uuid, name: &str, is_primary: bool) -> AddContact {
    AddContact {
        correlation_id: Uuid::new_v4(),
        customer_id,
        contact_name: name.into(),
        role: Some("Purchasing".into()),
        email: Some(format!("{}@acme.com", name.to_lowercase())),
        phone: None,
        receives_notifications: true,
        is_primary,
    }
}

fn map_external_id(customer_id: Uuid, system: &str, id: &str) -> MapExternalId {
    MapExternalId {
        correlation_id: Uuid::new_v4(),
        customer_id,
        external_system: system.into(),
        external_customer_id: id.into(),
        external_customer_name: None,
        is_primary: true,
    }
}

fn assert_primary_invariant(repo: &InMemoryCustomerRepository, customer_id: Uuid) {
    let snapshot = repo.snapshot(customer_id).unwrap();
    let primaries: Vec<_> = snapshot.contacts.iter().filter(|c| c.is_primary).collect();
    if snapshot.contacts.is_empty() {
        assert_eq!(snapshot.customer.primary_contact_id, None);
    } else {
        assert_eq!(primaries.len(), 1);
        assert_eq!(snapshot.customer.primary_contact_id, Some(primaries[0].id));
    }
}

#[tokio::test]
async fn test_create_customer_persists_active_customer_at_version_one() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();

    // Act
    let customer = create(&repo, "Acme").await;

    // Assert
    let snapshot = repo.snapshot(customer.id).unwrap();
    assert!(snapshot.customer.is_active);
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.customer.created_at, clock().0);
    let batches = repo.applied_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1, 0);
    assert!(matches!(batches[0].2[..], [CustomerChange::CustomerCreated(_)]));
}

#[tokio::test]
async fn test_create_customer_with_blank_name_writes_nothing() {
    let repo = InMemoryCustomerRepository::new();

    let result = handle_create_customer(
        &CreateCustomer {
            correlation_id: Uuid::new_v4(),
            customer_name: String::new(),
            customer_type: CustomerType::FullCustom,
            pricing_tier: None,
            notes: None,
        },
        &clock(),
        &repo,
    )
    .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(repo.applied_batches().is_empty());
}

#[tokio::test]
async fn test_overlong_pricing_tier_label_is_a_validation_error() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;

    // Act
    let created = handle_create_customer(
        &CreateCustomer {
            correlation_id: Uuid::new_v4(),
            customer_name: "Gold Homes".into(),
            customer_type: CustomerType::Production,
            pricing_tier: Some("G".repeat(101)),
            notes: None,
        },
        &clock(),
        &repo,
    )
    .await;
    let updated = handle_update_customer(
        &UpdateCustomer {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            pricing_tier: Some("G".repeat(101)),
            ..UpdateCustomer::default()
        },
        &clock(),
        &repo,
    )
    .await;

    // Assert
    assert!(matches!(created, Err(DomainError::Validation(msg)) if msg.contains("pricing tier")));
    assert!(matches!(updated, Err(DomainError::Validation(_))));
    assert_eq!(repo.applied_batches().len(), 1);
}

#[tokio::test]
async fn test_overlong_contact_email_is_a_validation_error() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let long_email = format!("{}@acme.com", "j".repeat(250));
    let mut command = add_contact(acme.id, "Jane", false);
    command.email = Some(long_email.clone());

    // Act
    let added = handle_add_contact(&command, &clock(), &repo).await;
    let jane = handle_add_contact(&add_contact(acme.id, "Jane", false), &clock(), &repo)
        .await
        .unwrap();
    let updated = handle_update_contact(
        &UpdateContact {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            contact_id: jane.id,
            email: Some(long_email),
            ..UpdateContact::default()
        },
        &clock(),
        &repo,
    )
    .await;

    // Assert
    assert!(matches!(added, Err(DomainError::Validation(msg)) if msg.contains("email")));
    assert!(matches!(updated, Err(DomainError::Validation(_))));
    let snapshot = repo.snapshot(acme.id).unwrap();
    assert_eq!(snapshot.contacts.len(), 1);
    assert_eq!(snapshot.contacts[0].email.as_deref(), Some("jane@acme.com"));
}

#[tokio::test]
async fn test_acme_primary_contact_lifecycle() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;

    // Act & Assert: the first contact is primary even without the flag.
    let a = handle_add_contact(&add_contact(acme.id, "A", false), &clock(), &repo)
        .await
        .unwrap();
    assert!(a.is_primary);
    assert_primary_invariant(&repo, acme.id);

    // A primary second contact demotes the first.
    let later = clock().advanced(Duration::minutes(5));
    let b = handle_add_contact(&add_contact(acme.id, "B", true), &later, &repo)
        .await
        .unwrap();
    let snapshot = repo.snapshot(acme.id).unwrap();
    assert_eq!(snapshot.customer.primary_contact_id, Some(b.id));
    assert!(!snapshot.contacts.iter().find(|c| c.id == a.id).unwrap().is_primary);
    assert_primary_invariant(&repo, acme.id);

    // Removing the primary promotes the survivor.
    let promoted = handle_remove_contact(
        &RemoveContact {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            contact_id: b.id,
        },
        &later,
        &repo,
    )
    .await
    .unwrap();
    assert_eq!(promoted, Some(a.id));
    assert_primary_invariant(&repo, acme.id);

    // Removing the last contact clears the reference.
    handle_remove_contact(
        &RemoveContact {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            contact_id: a.id,
        },
        &later,
        &repo,
    )
    .await
    .unwrap();
    assert_primary_invariant(&repo, acme.id);
}

#[tokio::test]
async fn test_update_contact_on_another_customer_is_not_found() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let other = create(&repo, "Other").await;
    let contact = handle_add_contact(&add_contact(acme.id, "A", false), &clock(), &repo)
        .await
        .unwrap();

    let result = handle_update_contact(
        &UpdateContact {
            customer_id: other.id,
            contact_id: contact.id,
            contact_name: Some("Renamed".into()),
            ..UpdateContact::default()
        },
        &clock(),
        &repo,
    )
    .await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound { entity: EntityKind::Contact, .. })
    ));
}

#[tokio::test]
async fn test_update_customer_designates_primary_contact() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    handle_add_contact(&add_contact(acme.id, "A", false), &clock(), &repo)
        .await
        .unwrap();
    let b = handle_add_contact(&add_contact(acme.id, "B", false), &clock(), &repo)
        .await
        .unwrap();

    let updated = handle_update_customer(
        &UpdateCustomer {
            customer_id: acme.id,
            primary_contact_id: Some(b.id),
            notes: Some("prefers email".into()),
            ..UpdateCustomer::default()
        },
        &clock(),
        &repo,
    )
    .await
    .unwrap();

    assert_eq!(updated.primary_contact_id, Some(b.id));
    assert_eq!(updated.notes.as_deref(), Some("prefers email"));
    assert_primary_invariant(&repo, acme.id);
}

#[tokio::test]
async fn test_update_unknown_customer_is_not_found() {
    let repo = InMemoryCustomerRepository::new();

    let result = handle_update_customer(
        &UpdateCustomer {
            customer_id: Uuid::new_v4(),
            customer_name: Some("Ghost".into()),
            ..UpdateCustomer::default()
        },
        &clock(),
        &repo,
    )
    .await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound { entity: EntityKind::Customer, .. })
    ));
}

#[tokio::test]
async fn test_soft_delete_is_allowed_with_jobs() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    repo.add_jobs(acme.id, 2);

    handle_delete_customer(
        &DeleteCustomer {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            mode: DeleteMode::Soft,
        },
        &clock(),
        &repo,
    )
    .await
    .unwrap();

    assert!(!repo.snapshot(acme.id).unwrap().customer.is_active);
}

#[tokio::test]
async fn test_hard_delete_with_jobs_reports_job_count_and_keeps_everything() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    handle_add_contact(&add_contact(acme.id, "A", false), &clock(), &repo)
        .await
        .unwrap();
    repo.add_jobs(acme.id, 2);

    // Act
    let result = handle_delete_customer(
        &DeleteCustomer {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            mode: DeleteMode::Hard,
        },
        &clock(),
        &repo,
    )
    .await;

    // Assert
    match result {
        Err(DomainError::HasDependencies { job_count, .. }) => assert_eq!(job_count, 2),
        other => panic!("expected HasDependencies, got {other:?}"),
    }
    let snapshot = repo.snapshot(acme.id).unwrap();
    assert!(snapshot.customer.is_active);
    assert_eq!(snapshot.contacts.len(), 1);
}

#[tokio::test]
async fn test_hard_delete_without_jobs_removes_customer_and_children() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    handle_add_contact(&add_contact(acme.id, "A", false), &clock(), &repo)
        .await
        .unwrap();
    handle_map_external_id(&map_external_id(acme.id, "SALES_1440", "X-1"), &clock(), &repo)
        .await
        .unwrap();

    handle_delete_customer(
        &DeleteCustomer {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            mode: DeleteMode::Hard,
        },
        &clock(),
        &repo,
    )
    .await
    .unwrap();

    assert!(repo.snapshot(acme.id).is_none());
}

#[tokio::test]
async fn test_second_mapping_for_same_system_is_duplicate() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    handle_map_external_id(&map_external_id(acme.id, "SALES_1440", "X-1"), &clock(), &repo)
        .await
        .unwrap();

    let result =
        handle_map_external_id(&map_external_id(acme.id, "SALES_1440", "X-2"), &clock(), &repo)
            .await;

    assert!(matches!(result, Err(DomainError::Duplicate { .. })));
    assert_eq!(repo.snapshot(acme.id).unwrap().external_ids.len(), 1);
}

#[tokio::test]
async fn test_same_external_pair_on_two_customers_is_allowed() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let other = create(&repo, "Other").await;

    handle_map_external_id(&map_external_id(acme.id, "SALES_1440", "X-1"), &clock(), &repo)
        .await
        .unwrap();
    let second =
        handle_map_external_id(&map_external_id(other.id, "SALES_1440", "X-1"), &clock(), &repo)
            .await;

    assert!(second.is_ok());
}

#[tokio::test]
async fn test_update_and_remove_external_id() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let mapping =
        handle_map_external_id(&map_external_id(acme.id, "SALES_1440", "X-1"), &clock(), &repo)
            .await
            .unwrap();

    let updated = handle_update_external_id(
        &UpdateExternalId {
            customer_id: acme.id,
            external_id: mapping.id,
            external_customer_name: Some("Acme Homes LLC".into()),
            ..UpdateExternalId::default()
        },
        &repo,
    )
    .await
    .unwrap();
    assert_eq!(updated.external_customer_name.as_deref(), Some("Acme Homes LLC"));

    handle_remove_external_id(
        &RemoveExternalId {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            external_id: mapping.id,
        },
        &repo,
    )
    .await
    .unwrap();
    assert!(repo.snapshot(acme.id).unwrap().external_ids.is_empty());
}

#[tokio::test]
async fn test_update_pricing_tier_rejects_window_ending_before_start() {
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let tier = handle_add_pricing_tier(
        &AddPricingTier {
            correlation_id: Uuid::new_v4(),
            customer_id: acme.id,
            tier_name: "Gold".into(),
            discount_percentage: 12.5,
            effective_date: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            expiration_date: None,
        },
        &clock(),
        &repo,
    )
    .await
    .unwrap();

    let result = handle_update_pricing_tier(
        &UpdatePricingTier {
            customer_id: acme.id,
            tier_id: tier.id,
            expiration_date: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            ..UpdatePricingTier::default()
        },
        &repo,
    )
    .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(repo.snapshot(acme.id).unwrap().pricing_tiers[0].expiration_date, None);
}

#[tokio::test]
async fn test_stale_version_is_a_concurrency_conflict() {
    // Arrange
    let repo = InMemoryCustomerRepository::new();
    let acme = create(&repo, "Acme").await;
    let account_version = repo.snapshot(acme.id).unwrap().version;
    repo.bump_version(acme.id);

    // Act
    let result = mindflow_customers::domain::repository::CustomerRepository::apply_changes(
        &repo,
        acme.id,
        account_version,
        &[CustomerChange::CustomerUpdated(acme.clone())],
    )
    .await;

    // Assert
    match result {
        Err(DomainError::ConcurrencyConflict { expected, actual, .. }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_infrastructure_errors_propagate() {
    let repo = FailingCustomerRepository;

    let result = handle_add_contact(&add_contact(Uuid::new_v4(), "A", false), &clock(), &repo).await;

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
}
