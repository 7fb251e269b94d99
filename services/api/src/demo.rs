use clap::Args;
use std::sync::Arc;

use crate::infra::InMemoryCheckinLedger;
use venue_checkin::checkin::{
    CandidateId, CheckinApp, CheckinOutcome, CheckinRequest, ReleaseOutcome, Role, ScheduleId,
    VenueDefinition, VenueId, VenueStatus,
};
use venue_checkin::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Walk-in candidates arriving after the first occupant
    #[arg(long, default_value_t = 3)]
    pub(crate) walk_ins: usize,
    /// Validity window for the scripted QR token, in minutes
    #[arg(long, default_value_t = 10)]
    pub(crate) token_ttl_minutes: i64,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let ledger = Arc::new(InMemoryCheckinLedger::default());
    let app = CheckinApp::new(args.token_ttl_minutes, ledger.clone());

    section("Venue registration");
    for (id, name, venue_type) in [
        ("venue-p1", "Practical Bay 1", "practical"),
        ("venue-t1", "Theory Room 1", "theory"),
    ] {
        match app.registry.register(VenueDefinition {
            id: VenueId(id.to_string()),
            name: name.to_string(),
            venue_type: venue_type.to_string(),
            capacity: 1,
        }) {
            Ok(venue) => println!("  registered {:<20} [{}]", venue.name, venue.status.label()),
            Err(err) => println!("  ! registration failed for {id}: {err}"),
        }
    }

    section("QR token issuance");
    let scanned = app.tokens.issue(
        &CandidateId("cand-001".to_string()),
        &ScheduleId("sched-0900".to_string()),
    );
    println!(
        "  issued token for cand-001 / sched-0900, valid until {}",
        scanned.expires_at
    );

    section("Scan check-in");
    report_checkin(
        &app,
        CheckinRequest::Token {
            raw: scanned.token.clone(),
        },
        "venue-p1",
        Role::Candidate,
    );

    section("Walk-in queue");
    for index in 0..args.walk_ins {
        let candidate = format!("cand-{:03}", index + 2);
        let schedule = format!("sched-{:04}", 1000 + index);
        report_checkin(
            &app,
            CheckinRequest::Manual {
                candidate_id: CandidateId(candidate),
                schedule_id: ScheduleId(schedule),
            },
            "venue-p1",
            Role::Staff,
        );
    }

    section("Conflicts");
    report_checkin(
        &app,
        CheckinRequest::Manual {
            candidate_id: CandidateId("cand-002".to_string()),
            schedule_id: ScheduleId("sched-1000".to_string()),
        },
        "venue-t1",
        Role::Staff,
    );
    report_checkin(
        &app,
        CheckinRequest::Token { raw: scanned.token },
        "venue-p1",
        Role::Candidate,
    );

    section("Release and promotion");
    match app.coordinator.release(&VenueId("venue-p1".to_string())) {
        Ok(ReleaseOutcome::Promoted {
            venue,
            candidate_id,
        }) => println!(
            "  released {}; promoted {} from the queue",
            venue.name, candidate_id.0
        ),
        Ok(ReleaseOutcome::Vacated { venue }) => {
            println!("  released {}; queue empty, venue available", venue.name)
        }
        Err(err) => println!("  ! release failed: {err}"),
    }

    section("Maintenance");
    match app
        .registry
        .set_status(&VenueId("venue-t1".to_string()), VenueStatus::Maintenance)
    {
        Ok(venue) => println!("  {} moved to [{}]", venue.name, venue.status.label()),
        Err(err) => println!("  ! status change failed: {err}"),
    }
    report_checkin(
        &app,
        CheckinRequest::Manual {
            candidate_id: CandidateId("cand-900".to_string()),
            schedule_id: ScheduleId("sched-1700".to_string()),
        },
        "venue-t1",
        Role::Staff,
    );

    section("Status snapshot");
    let snapshot = app.broadcaster.snapshot();
    for view in &snapshot.venues {
        let occupant = view
            .current_occupant
            .as_ref()
            .map(|candidate| candidate.0.as_str())
            .unwrap_or("-");
        println!(
            "  {:<20} [{:<11}] occupant: {:<10} waiting: {}",
            view.name,
            view.status.label(),
            occupant,
            view.waiting_count
        );
    }
    println!(
        "  summary: {} venues, {} active, {} waiting (revision {})",
        snapshot.summary.total_venues,
        snapshot.summary.active_venues,
        snapshot.summary.total_waiting,
        snapshot.revision
    );

    section("Audit trail");
    for record in ledger.entries() {
        println!(
            "  {} {:<9} {:<10} at {} via {:?}{}",
            record.timestamp.format("%H:%M:%S"),
            record.result.label(),
            record.candidate_id.0,
            record.venue_id.0,
            record.method,
            record
                .detail
                .as_ref()
                .map(|detail| format!(" ({detail})"))
                .unwrap_or_default()
        );
    }

    Ok(())
}

fn report_checkin(
    app: &CheckinApp<InMemoryCheckinLedger>,
    request: CheckinRequest,
    venue_id: &str,
    caller: Role,
) {
    match app
        .coordinator
        .perform_checkin(request, &VenueId(venue_id.to_string()), caller)
    {
        Ok(CheckinOutcome::CheckedIn { venue }) => {
            let occupant = venue
                .current_occupant
                .as_ref()
                .map(|candidate| candidate.0.as_str())
                .unwrap_or("-");
            println!("  {occupant} checked in to {}", venue.name);
        }
        Ok(CheckinOutcome::Queued { venue, position }) => {
            println!("  {} occupied; queued at position {position}", venue.name);
        }
        Err(err) => println!("  ! check-in rejected: {err}"),
    }
}

fn section(title: &str) {
    println!();
    println!("== {title} ==");
}
