//! Daily digest to district campaign managers.

mod common;

use common::*;
use procura_core::forwarding::CampaignManagerContact;
use procura_core::jurisdiction::Jurisdiction;
use procura_core::status::RequestStatus;
use procura_matching::forwarding::forward_pending_requests_to_campaign_managers;

fn manager(registry: &MemoryRegistry, district: &str, email: &str) {
    registry.with(|s| {
        s.managers.insert(
            district.to_string(),
            CampaignManagerContact {
                district: district.to_string(),
                name: "Camille".to_string(),
                email: email.to_string(),
            },
        )
    });
}

/// Two communes of district 75-01, one of 13-02, one without a district.
fn setup() -> (MemoryRegistry, Vec<i64>) {
    let registry = MemoryRegistry::new();
    registry.add_commune(1, Some(PARIS), Some("75-01"));
    registry.add_commune(2, Some(PARIS), Some("75-01"));
    registry.add_commune(3, None, Some("13-02"));
    registry.add_commune(4, None, None);
    let ids = vec![
        registry.add_request("a@x.org", Jurisdiction::Commune(1), day(12)),
        registry.add_request("b@x.org", Jurisdiction::Commune(2), day(19)),
        registry.add_request("c@x.org", Jurisdiction::Commune(3), day(12)),
        registry.add_request("d@x.org", Jurisdiction::Commune(4), day(12)),
        registry.add_request("e@x.org", Jurisdiction::Consulate(9), day(12)),
    ];
    manager(&registry, "75-01", "paris@campaign.org");
    manager(&registry, "13-02", "marseille@campaign.org");
    (registry, ids)
}

#[tokio::test]
async fn each_district_gets_one_digest_and_requests_leave_the_pool() {
    let (registry, ids) = setup();
    let mailer = RecordingMailer::default();

    let report = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    assert_eq!(report.districts, vec!["13-02", "75-01"]);
    assert_eq!(report.forwarded_request_ids, vec![ids[0], ids[1], ids[2]]);
    assert!(report.failed_districts.is_empty());

    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    let paris = sent.iter().find(|d| d.to == "paris@campaign.org").unwrap();
    assert_eq!(paris.attachment_name, "voting_proxy_requests-2022-06-01.csv");
    assert_eq!(paris.csv.lines().count(), 3);
    assert!(paris.csv.contains("a@x.org"));
    assert!(paris.csv.contains("Commune 2"));
    assert!(paris.body.contains("2 voting proxy request(s) from district 75-01"));

    for id in &ids[..3] {
        assert_eq!(registry.request(*id).status, RequestStatus::Forwarded);
    }
    // no district, or not a commune: never forwarded
    assert_eq!(registry.request(ids[3]).status, RequestStatus::Created);
    assert_eq!(registry.request(ids[4]).status, RequestStatus::Created);
}

#[tokio::test]
async fn second_run_on_the_same_day_sends_nothing() {
    let (registry, _) = setup();
    let mailer = RecordingMailer::default();
    forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    // a late request in an already handled district waits for tomorrow
    let late = registry.add_request("late@x.org", Jurisdiction::Commune(1), day(12));
    let report = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    assert_eq!(mailer.sent().len(), 2);
    assert_eq!(report.skipped_districts, vec!["75-01"]);
    assert!(report.forwarded_request_ids.is_empty());
    assert_eq!(registry.request(late).status, RequestStatus::Created);

    let next_day = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(2))
        .await
        .unwrap();
    assert_eq!(next_day.forwarded_request_ids, vec![late]);
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    let (registry, ids) = setup();

    let report =
        forward_pending_requests_to_campaign_managers(&registry, None::<&RecordingMailer>, day(1))
            .await
            .unwrap();

    assert_eq!(report.districts.len(), 2);
    assert!(report.forwarded_request_ids.is_empty());
    for id in &ids {
        assert_eq!(registry.request(*id).status, RequestStatus::Created);
    }
    assert!(registry.with(|s| s.forwardings.is_empty()));
}

#[tokio::test]
async fn failed_email_leaves_requests_pending() {
    let (registry, ids) = setup();
    let mailer = RecordingMailer::failing();

    let report = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    assert_eq!(report.failed_districts, vec!["13-02", "75-01"]);
    assert!(report.districts.is_empty());
    for id in &ids {
        assert_eq!(registry.request(*id).status, RequestStatus::Created);
    }

    // nothing was logged, so a retry the same day goes through
    let retry = forward_pending_requests_to_campaign_managers(
        &registry,
        Some(&RecordingMailer::default()),
        day(1),
    )
    .await
    .unwrap();
    assert_eq!(retry.forwarded_request_ids.len(), 3);
}

#[tokio::test]
async fn district_without_manager_is_skipped() {
    let (registry, ids) = setup();
    registry.with(|s| s.managers.remove("13-02"));
    let mailer = RecordingMailer::default();

    let report = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    assert_eq!(report.skipped_districts, vec!["13-02"]);
    assert_eq!(report.districts, vec!["75-01"]);
    assert_eq!(registry.request(ids[2]).status, RequestStatus::Created);
}

#[tokio::test]
async fn assigned_requests_are_not_forwarded() {
    let (registry, ids) = setup();
    registry.with(|s| {
        let r = s.requests.get_mut(&ids[0]).unwrap();
        r.status = RequestStatus::Accepted;
        r.proxy_id = Some(42);
    });
    let mailer = RecordingMailer::default();

    let report = forward_pending_requests_to_campaign_managers(&registry, Some(&mailer), day(1))
        .await
        .unwrap();

    assert_eq!(report.forwarded_request_ids, vec![ids[1], ids[2]]);
    assert_eq!(registry.request(ids[0]).status, RequestStatus::Accepted);
}
