//! Writes a snapshot back into the world.
//!
//! Passes run in a fixed order: kill, cell write, fix, attachments.

use crate::attachment::AttachmentKind;
use crate::error::ClipError;
use crate::fixtures::{apply_at, spec_for_cell};
use crate::geometry::{Offset, Point, Rect};
use crate::guard::CancellationHandle;
use crate::snapshot::Snapshot;
use crate::store::{FixtureState, Host};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use web_time::Instant;

const SLOW_APPLY_MS: f64 = 250.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub cells_written: u64,
    pub cells_clipped: u64,
    pub fixtures_killed: u32,
    pub fixtures_placed: u32,
    pub fixtures_restored: u32,
    pub fixtures_unavailable: u32,
    pub attachments_applied: u32,
    pub attachments_skipped: u32,
}

/// A fixture removed by the kill pass, kept until the write is committed.
struct KilledFixture {
    kind: AttachmentKind,
    anchor: Point,
    state: Option<FixtureState>,
}

/// Applies `snapshot` with its origin at `target_origin`.
pub fn apply_snapshot<H: Host + ?Sized>(
    host: &mut H,
    snapshot: &Snapshot,
    target_origin: Point,
) -> ApplyReport {
    match apply_snapshot_cancellable(host, snapshot, target_origin, None) {
        Ok(report) => report,
        // Only reachable through a cancellation handle.
        Err(_) => ApplyReport::default(),
    }
}

/// Like [`apply_snapshot`], polling `cancel` between the kill pass and the
/// cell write. Fixtures anchored outside the footprint but overlapping it are
/// killed too, and re-registered with their contents if the write leaves them
/// whole. A cancellation seen there re-registers every killed fixture
/// with its previous contents and returns [`ClipError::Cancelled`]; once the
/// write starts the apply runs to completion.
pub fn apply_snapshot_cancellable<H: Host + ?Sized>(
    host: &mut H,
    snapshot: &Snapshot,
    target_origin: Point,
    cancel: Option<&CancellationHandle>,
) -> Result<ApplyReport, ClipError> {
    let start = Instant::now();
    let mut report = ApplyReport::default();
    let Some(footprint) = snapshot.footprint_at(target_origin) else {
        debug!("apply of an empty snapshot at {target_origin}; nothing to do");
        return Ok(report);
    };
    let Some(written) = footprint.intersect(&host.world_bounds()) else {
        report.cells_clipped = snapshot.cells().len() as u64;
        debug!(
            "{}",
            ClipError::OutOfBounds {
                position: target_origin
            }
        );
        return Ok(report);
    };

    let killed = kill_pass(host, written);
    report.fixtures_killed = killed.len() as u32;

    if cancel.is_some_and(CancellationHandle::is_cancelled) {
        restore_killed(host, killed);
        debug!("apply at {target_origin} cancelled after kill pass; fixtures restored");
        return Err(ClipError::Cancelled);
    }

    write_cells(host, snapshot, target_origin, &mut report);
    fix_pass(host, written, &mut report);
    restore_straddling(host, killed, written, &mut report);
    apply_attachments(host, snapshot, target_origin - snapshot.origin(), &mut report);

    host.invalidate(written);
    host.schedule_flush();

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    if elapsed_ms > SLOW_APPLY_MS {
        warn!("slow apply of {written}: {elapsed_ms:.1} ms ({report:?})");
    } else {
        debug!("applied {written} in {elapsed_ms:.3} ms: {report:?}");
    }
    Ok(report)
}

fn kill_pass<H: Host + ?Sized>(host: &mut H, footprint: Rect) -> Vec<KilledFixture> {
    let mut seen = HashSet::new();
    let mut killed = Vec::new();
    for pos in footprint.positions() {
        let cell = host.read_cell(pos);
        let Some(spec) = spec_for_cell(&cell) else {
            continue;
        };
        let anchor = spec.anchor_of(&cell, pos);
        if !seen.insert((spec.kind, anchor)) {
            continue;
        }
        let state = host
            .find(spec.kind, anchor)
            .and_then(|id| host.state(id).cloned());
        if host.kill(spec.kind, anchor) {
            killed.push(KilledFixture {
                kind: spec.kind,
                anchor,
                state,
            });
        }
    }
    killed
}

fn restore_killed<H: Host + ?Sized>(host: &mut H, killed: Vec<KilledFixture>) {
    for fixture in killed {
        let (kind, anchor) = (fixture.kind, fixture.anchor);
        if !reinstate(host, fixture) {
            warn!(
                "{} while rolling back",
                ClipError::FixtureUnavailable {
                    kind,
                    position: anchor,
                }
            );
        }
    }
}

/// Re-registers killed fixtures anchored outside `written` whose cells still
/// form the same fixture after the write.
fn restore_straddling<H: Host + ?Sized>(
    host: &mut H,
    killed: Vec<KilledFixture>,
    written: Rect,
    report: &mut ApplyReport,
) {
    for fixture in killed {
        if written.contains(fixture.anchor) || host.find(fixture.kind, fixture.anchor).is_some() {
            continue;
        }
        if !is_intact(host, fixture.kind, fixture.anchor) {
            debug!(
                "{} fixture at {} torn by the write; left unregistered",
                fixture.kind, fixture.anchor
            );
            continue;
        }
        if reinstate(host, fixture) {
            report.fixtures_restored += 1;
        }
    }
}

fn reinstate<H: Host + ?Sized>(host: &mut H, fixture: KilledFixture) -> bool {
    let Some(id) = host.place(fixture.kind, fixture.anchor) else {
        return false;
    };
    if let (Some(saved), Some(live)) = (fixture.state, host.state_mut(id)) {
        *live = saved;
    }
    true
}

/// Whether every sub-cell of the `kind` fixture at `anchor` still resolves to
/// that anchor.
fn is_intact<H: Host + ?Sized>(host: &H, kind: AttachmentKind, anchor: Point) -> bool {
    let bounds = host.world_bounds();
    let anchor_cell = host.read_cell(anchor);
    let Some(spec) = spec_for_cell(&anchor_cell).filter(|spec| spec.kind == kind) else {
        return false;
    };
    if !spec.is_anchor(&anchor_cell) {
        return false;
    }
    (0..i32::from(spec.cols)).all(|dx| {
        (0..i32::from(spec.rows)).all(|dy| {
            let Some(pos) = anchor
                .checked_offset(Offset::new(dx, dy))
                .filter(|pos| bounds.contains(*pos))
            else {
                return false;
            };
            let cell = host.read_cell(pos);
            spec.matches(&cell) && spec.anchor_of(&cell, pos) == anchor
        })
    })
}

fn write_cells<H: Host + ?Sized>(
    host: &mut H,
    snapshot: &Snapshot,
    target_origin: Point,
    report: &mut ApplyReport,
) {
    let bounds = host.world_bounds();
    let mut first_clipped = None;
    for (x, y, cell) in snapshot.cells().iter() {
        let target = i32::try_from(x)
            .ok()
            .zip(i32::try_from(y).ok())
            .and_then(|(dx, dy)| target_origin.checked_offset(Offset::new(dx, dy)))
            .filter(|pos| bounds.contains(*pos));
        match target {
            Some(pos) => {
                host.write_cell(pos, *cell);
                report.cells_written += 1;
            }
            None => {
                report.cells_clipped += 1;
                first_clipped.get_or_insert((x, y));
            }
        }
    }
    if let Some((x, y)) = first_clipped {
        debug!(
            "{} cells clipped, first at {}",
            report.cells_clipped,
            ClipError::OutOfBounds {
                position: target_origin + Offset::new(x as i32, y as i32),
            }
        );
    }
}

fn fix_pass<H: Host + ?Sized>(host: &mut H, footprint: Rect, report: &mut ApplyReport) {
    for pos in footprint.positions() {
        let cell = host.read_cell(pos);
        let Some(spec) = spec_for_cell(&cell) else {
            continue;
        };
        if !spec.is_anchor(&cell) || host.find(spec.kind, pos).is_some() {
            continue;
        }
        if host.place(spec.kind, pos).is_some() {
            report.fixtures_placed += 1;
        } else {
            report.fixtures_unavailable += 1;
            warn!(
                "{}",
                ClipError::FixtureUnavailable {
                    kind: spec.kind,
                    position: pos,
                }
            );
        }
    }
}

fn apply_attachments<H: Host + ?Sized>(
    host: &mut H,
    snapshot: &Snapshot,
    translation: Offset,
    report: &mut ApplyReport,
) {
    for attachment in snapshot.attachments().iter() {
        let at = attachment.position() + translation;
        if apply_at(host, attachment, at) {
            report.attachments_applied += 1;
        } else {
            report.attachments_skipped += 1;
            warn!(
                "{}; attachment skipped",
                ClipError::FixtureUnavailable {
                    kind: attachment.kind(),
                    position: at,
                }
            );
        }
    }
}
