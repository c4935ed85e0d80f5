use super::changes::{ChangeSet, RecordPatch};
use super::CrudError;
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::Identity;
use crate::config::BackfillDefaults;
use crate::record::{canonical_number, columns, CaseRecord, Dataset, RecordId, RegionProfile, MAX_YEAR, MIN_YEAR};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of applying a change set: the dataset to persist and the audit
/// entries to append once it has been persisted.
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub dataset: Dataset,
    pub entries: Vec<AuditEntry>,
}

impl ChangeOutcome {
    /// True when the change set altered nothing
    pub fn is_noop(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply `changes` to `base` on behalf of `identity`.
///
/// Regional identities may only touch rows of their own region and may not
/// move a row to other protected values; their additions are backfilled
/// from the region profile. Master edits stay in place and additions are
/// appended. For regional edits the result is other regions' rows
/// unchanged, then the region's edited rows, then additions.
///
/// A deletion takes precedence over an update of the same id.
pub fn apply_changes(
    base: &Dataset,
    identity: &Identity,
    changes: &ChangeSet,
    defaults: &BackfillDefaults,
) -> Result<ChangeOutcome, CrudError> {
    check_scope(base, identity, changes)?;

    let deleted: HashSet<RecordId> = changes.deletions.iter().copied().collect();
    let mut patches: HashMap<RecordId, Vec<&RecordPatch>> = HashMap::new();
    for (id, patch) in &changes.updates {
        patches.entry(*id).or_default().push(patch);
    }

    let mut entries = Vec::new();
    let mut touched: HashSet<RecordId> = HashSet::new();
    let mut kept: Vec<CaseRecord> = Vec::with_capacity(base.len() + changes.additions.len());

    for record in base {
        if deleted.contains(&record.id) {
            continue;
        }
        let Some(record_patches) = patches.get(&record.id) else {
            kept.push(record.clone());
            continue;
        };

        let mut updated = record.clone();
        for patch in record_patches {
            apply_patch(&mut updated, patch);
        }
        let diff = describe_changes(record, &updated);
        if !diff.is_empty() {
            validate_row(&updated)?;
            touched.insert(updated.id);
            entries.push(AuditEntry::now(
                identity,
                AuditAction::Update,
                format!("updated row ({}); changes: {}", updated.describe(), diff.join(", ")),
            ));
        }
        kept.push(updated);
    }

    let mut next_id = base.next_id();
    let mut added = Vec::with_capacity(changes.additions.len());
    for patch in &changes.additions {
        let id = next_id.ok_or_else(|| CrudError::Invalid("no record ids left".to_string()))?;
        let record = build_addition(base, identity, patch, id, defaults)?;
        validate_row(&record)?;
        next_id = id.value().checked_add(1).map(RecordId::new);
        touched.insert(record.id);
        entries.push(AuditEntry::now(
            identity,
            AuditAction::Create,
            format!(
                "created row ({}, {}: {})",
                record.describe(),
                columns::CASE_COUNT,
                canonical_number(record.case_count)
            ),
        ));
        added.push(record);
    }

    for record in base.iter().filter(|r| deleted.contains(&r.id)) {
        entries.push(AuditEntry::now(
            identity,
            AuditAction::Delete,
            format!("deleted row ({})", record.describe()),
        ));
    }

    let records: Vec<CaseRecord> = match identity.scope() {
        None => kept.into_iter().chain(added).collect(),
        Some(region) => {
            let (own, others): (Vec<CaseRecord>, Vec<CaseRecord>) =
                kept.into_iter().partition(|r| r.region_code == region);
            others.into_iter().chain(own).chain(added).collect()
        }
    };
    let dataset = Dataset::from_records(records);

    check_unique(&dataset, &touched)?;

    debug!(
        user = identity.username(),
        entries = entries.len(),
        records = dataset.len(),
        "applied change set"
    );
    Ok(ChangeOutcome { dataset, entries })
}

fn check_scope(base: &Dataset, identity: &Identity, changes: &ChangeSet) -> Result<(), CrudError> {
    let ids = changes
        .updates
        .iter()
        .map(|(id, _)| *id)
        .chain(changes.deletions.iter().copied());
    for id in ids {
        base.get(id).ok_or(CrudError::UnknownRecord(id))?;
        // every row carrying the id is touched, not only the first
        if let Some(record) = base.iter().find(|r| r.id == id && !identity.can_access(&r.region_code)) {
            return Err(CrudError::Forbidden(format!(
                "{} may not modify row {} of region {}",
                identity.username(),
                id,
                record.region_code
            )));
        }
    }

    if identity.is_master() {
        return Ok(());
    }

    for (id, patch) in &changes.updates {
        if let Some(record) = base.get(*id) {
            if let Some(column) = changed_protected_column(record, patch) {
                return Err(CrudError::Forbidden(format!(
                    "{} may not change {} of row {}",
                    identity.username(),
                    column,
                    id
                )));
            }
        }
    }

    for patch in &changes.additions {
        if let Some(code) = non_blank(&patch.region_code) {
            if !identity.can_access(code) {
                return Err(CrudError::Forbidden(format!(
                    "{} may not add rows for region {}",
                    identity.username(),
                    code
                )));
            }
        }
    }
    Ok(())
}

fn changed_protected_column(record: &CaseRecord, patch: &RecordPatch) -> Option<&'static str> {
    let checks = [
        (columns::PROVINCE_CODE, &patch.province_code, &record.province_code),
        (columns::PROVINCE_NAME, &patch.province_name, &record.province_name),
        (columns::REGION_CODE, &patch.region_code, &record.region_code),
        (columns::REGION_NAME, &patch.region_name, &record.region_name),
        (columns::UNIT, &patch.unit, &record.unit),
    ];
    checks
        .into_iter()
        .find(|(_, new, current)| matches!(new, Some(v) if v.trim() != current.as_str()))
        .map(|(column, _, _)| column)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn apply_patch(record: &mut CaseRecord, patch: &RecordPatch) {
    let set = |field: &mut String, value: &Option<String>| {
        if let Some(v) = value {
            *field = v.trim().to_string();
        }
    };
    set(&mut record.province_code, &patch.province_code);
    set(&mut record.province_name, &patch.province_name);
    set(&mut record.region_code, &patch.region_code);
    set(&mut record.region_name, &patch.region_name);
    set(&mut record.unit, &patch.unit);
    if let Some(count) = patch.case_count {
        record.case_count = count;
    }
    if let Some(year) = patch.year {
        record.year = year;
    }
}

/// `column: old -> new` for every field that differs
fn describe_changes(before: &CaseRecord, after: &CaseRecord) -> Vec<String> {
    let mut out = Vec::new();
    let mut text = |column: &str, old: &str, new: &str| {
        if old != new {
            out.push(format!("{}: {} -> {}", column, old, new));
        }
    };
    text(columns::PROVINCE_CODE, &before.province_code, &after.province_code);
    text(columns::PROVINCE_NAME, &before.province_name, &after.province_name);
    text(columns::REGION_CODE, &before.region_code, &after.region_code);
    text(columns::REGION_NAME, &before.region_name, &after.region_name);
    text(
        columns::CASE_COUNT,
        &canonical_number(before.case_count),
        &canonical_number(after.case_count),
    );
    text(columns::UNIT, &before.unit, &after.unit);
    text(columns::YEAR, &before.year.to_string(), &after.year.to_string());
    out
}

fn build_addition(
    base: &Dataset,
    identity: &Identity,
    patch: &RecordPatch,
    id: RecordId,
    defaults: &BackfillDefaults,
) -> Result<CaseRecord, CrudError> {
    let missing = |column: &str| CrudError::Invalid(format!("new row is missing {}", column));
    let case_count = patch.case_count.ok_or_else(|| missing(columns::CASE_COUNT))?;
    let year = patch.year.ok_or_else(|| missing(columns::YEAR))?;

    let given = |value: &Option<String>, column: &str| {
        non_blank(value)
            .map(str::to_string)
            .ok_or_else(|| missing(column))
    };

    match identity.scope() {
        None => Ok(CaseRecord {
            id,
            province_code: given(&patch.province_code, columns::PROVINCE_CODE)?,
            province_name: given(&patch.province_name, columns::PROVINCE_NAME)?,
            region_code: given(&patch.region_code, columns::REGION_CODE)?,
            region_name: given(&patch.region_name, columns::REGION_NAME)?,
            case_count,
            unit: given(&patch.unit, columns::UNIT)?,
            year,
        }),
        Some(region) => {
            let profile = base.region_profile(region).unwrap_or_else(|| RegionProfile {
                region_code: region.to_string(),
                region_name: defaults.region_name(region),
                province_code: defaults.province_code.clone(),
                province_name: defaults.province_name.clone(),
                unit: defaults.unit.clone(),
            });
            let or = |value: &Option<String>, fallback: &str| {
                non_blank(value).unwrap_or(fallback).to_string()
            };
            Ok(CaseRecord {
                id,
                province_code: or(&patch.province_code, &profile.province_code),
                province_name: or(&patch.province_name, &profile.province_name),
                region_code: region.to_string(),
                region_name: or(&patch.region_name, &profile.region_name),
                case_count,
                unit: or(&patch.unit, &profile.unit),
                year,
            })
        }
    }
}

/// Required fields present, non-negative finite count, plausible year
fn validate_row(record: &CaseRecord) -> Result<(), CrudError> {
    let texts = [
        (columns::PROVINCE_CODE, &record.province_code),
        (columns::PROVINCE_NAME, &record.province_name),
        (columns::REGION_CODE, &record.region_code),
        (columns::REGION_NAME, &record.region_name),
        (columns::UNIT, &record.unit),
    ];
    if let Some((column, _)) = texts.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(CrudError::Invalid(format!("row {}: {} is empty", record.id, column)));
    }
    if !record.case_count.is_finite() || record.case_count < 0.0 {
        return Err(CrudError::Invalid(format!(
            "row {}: {} must be a non-negative number",
            record.id,
            columns::CASE_COUNT
        )));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&record.year) {
        return Err(CrudError::Invalid(format!(
            "row {}: {} must be between {} and {}",
            record.id,
            columns::YEAR,
            MIN_YEAR,
            MAX_YEAR
        )));
    }
    Ok(())
}

/// Created or updated rows may not share `(region_code, year)` with any other row
fn check_unique(dataset: &Dataset, touched: &HashSet<RecordId>) -> Result<(), CrudError> {
    let mut by_key: HashMap<(&str, i32), usize> = HashMap::new();
    for record in dataset {
        *by_key.entry((record.region_code.as_str(), record.year)).or_default() += 1;
    }
    for record in dataset.iter().filter(|r| touched.contains(&r.id)) {
        if by_key.get(&(record.region_code.as_str(), record.year)).copied().unwrap_or(0) > 1 {
            return Err(CrudError::Duplicate {
                region_code: record.region_code.clone(),
                year: record.year,
            });
        }
    }
    Ok(())
}
