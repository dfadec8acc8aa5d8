//! Tenant company settings: account profile, formats, the working week and
//! the holiday calendar. Every record is scoped to the signed-in lead.
//!
//! `companysetting.holidayflag` tells whether next year's calendar has any
//! holidays yet; it is recomputed whenever that calendar may have changed.

use std::sync::Arc;

use axum::extract::{Path, State};
use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::Value;
use tenantdesk_core::{Collection, RuleSet};
use tenantdesk_mongodb::{DocumentStore, FindOptions};

use crate::error::Result;
use crate::extract::{CapContext, JsonBody};
use crate::record::{self, active, created, with_modified};
use crate::reply::{document_to_json, documents_to_json, Reply};
use crate::state::AppState;

/// First and last millisecond of `year`, UTC.
pub fn year_range(year: i32) -> Option<(i64, i64)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_milli_opt(23, 59, 59, 999)?;
    Some((start.and_utc().timestamp_millis(), end.and_utc().timestamp_millis()))
}

/// Same month and day in `year`. Feb 29 lands on Feb 28 in common years.
pub fn shift_to_year(millis: i64, year: i32) -> Option<i64> {
    let date = chrono::DateTime::from_timestamp_millis(millis)?.date_naive();
    let shifted = NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1))?;
    Some(shifted.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

fn next_year() -> i32 {
    Utc::now().year() + 1
}

fn hide_scope() -> Document {
    doc! { "internalstatus": 0, "externalstatus": 0, "leadid": 0 }
}

/// Live records of the tenant.
fn scoped(ctx: &CapContext) -> Document {
    let mut filter = active();
    filter.insert("leadid", ctx.lead_id);
    filter
}

/// `$set` body shared by every settings write.
fn stamped(ctx: &CapContext, fields: Document) -> Document {
    let mut set = fields;
    set.extend(doc! {
        "internalstatus": 1,
        "externalstatus": 1,
        "recordstatus": 1,
        "leadid": ctx.lead_id,
    });
    with_modified(set, &Bson::ObjectId(ctx.user_id))
}

fn year_param(raw: &str) -> std::result::Result<i32, Reply> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|y| year_range(*y).is_some())
        .ok_or(Reply::unprocessable("Year is required"))
}

/// Recompute the holiday flag for `year`. Failures only reach the log.
pub async fn refresh_holiday_flag(store: &dyn DocumentStore, lead_id: ObjectId, year: i32) {
    let Some((start, end)) = year_range(year) else {
        return;
    };
    let filter = doc! {
        "leadid": lead_id,
        "internalstatus": 1,
        "holidaydate": { "$gte": start, "$lte": end },
    };
    let outcome = match store.count(Collection::CompanyHoliday, filter).await {
        Ok(count) => {
            store
                .update_one(
                    Collection::CompanySetting,
                    doc! { "leadid": lead_id },
                    doc! { "$set": { "holidayflag": count > 0 } },
                    false,
                )
                .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        tracing::warn!(error = %e, lead_id = %lead_id, year, "Holiday flag refresh failed");
    }
}

async fn upsert(
    state: &AppState,
    collection: Collection,
    filter: Document,
    set: Document,
) -> Result<Option<bool>> {
    let outcome = state
        .store
        .update_one(collection, filter, doc! { "$set": set }, true)
        .await?;
    Ok(outcome.applied().then_some(outcome.upserted_id.is_some()))
}

fn updated(changed: Option<bool>) -> Reply {
    match changed {
        Some(_) => Reply::ok("Updated successfully"),
        None => Reply::bad_request("Error in updating"),
    }
}

pub async fn get_setting(State(state): State<Arc<AppState>>, ctx: CapContext) -> Result<Reply> {
    let found = state
        .store
        .find_one(Collection::CompanySetting, scoped(&ctx), Some(hide_scope()))
        .await?;
    let data = found
        .as_ref()
        .map(document_to_json)
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(Reply::ok("Fetched successfully").data(data))
}

pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("accountname", "Account name is required")
            .required("accountdomain", "Domain is required")
            .required("accountowner", "Owner is required")
            .required("accountlogo", "Logo is required")
            .required("mobileappname", "App Name is required")
            .required("mobileapplogo", "App Logo is required")
            .required("accounttheme", "Theme is required")
            .required("startingtime", "Start time is required")
            .required("closingtime", "Close time is required")
            .numeric("holidayflagremainder", "Reminder is required"),
    )?;
    let fields = doc! {
        "accountname": body.text("accountname"),
        "accountdomain": body.text("accountdomain"),
        "accountowner": body.text("accountowner"),
        "accountlogo": body.text("accountlogo"),
        "mobileappname": body.text("mobileappname"),
        "mobileapplogo": body.text("mobileapplogo"),
        "accounttheme": body.text("accounttheme"),
        "startingtime": body.text("startingtime"),
        "closingtime": body.text("closingtime"),
        "holidayflagremainder": body.number("holidayflagremainder").unwrap_or(Bson::Int64(0)),
    };
    let changed = upsert(
        &state,
        Collection::CompanySetting,
        doc! { "leadid": ctx.lead_id },
        stamped(&ctx, fields),
    )
    .await?;
    if changed == Some(true) {
        refresh_holiday_flag(state.store.as_ref(), ctx.lead_id, next_year()).await;
    }
    Ok(updated(changed))
}

pub async fn get_format_setting(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
) -> Result<Reply> {
    let found = state
        .store
        .find_one(Collection::CompanyFormatSetting, scoped(&ctx), Some(hide_scope()))
        .await?;
    let data = found
        .as_ref()
        .map(document_to_json)
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(Reply::ok("Fetched successfully").data(data))
}

pub async fn update_format_setting(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("accounttimezone", "Time Zone is required")
            .required("language", "Language is required")
            .required("dateformat", "Date format is required")
            .required("numberformat", "Number format is required")
            .required("currencyformat", "Currency format is required"),
    )?;
    let fields = doc! {
        "accounttimezone": body.text("accounttimezone"),
        "language": body.text("language"),
        "dateformat": body.text("dateformat"),
        "numberformat": body.text("numberformat"),
        "currencyformat": body.text("currencyformat"),
    };
    let changed = upsert(
        &state,
        Collection::CompanyFormatSetting,
        doc! { "leadid": ctx.lead_id },
        stamped(&ctx, fields),
    )
    .await?;
    Ok(updated(changed))
}

pub async fn get_work_setting(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    Path(year): Path<String>,
) -> Result<Reply> {
    let year = year_param(&year)?;
    let mut filter = scoped(&ctx);
    filter.insert("year", i64::from(year));
    let days = state
        .store
        .find(
            Collection::CompanyWorkSetting,
            filter,
            FindOptions::default().projection(hide_scope()),
        )
        .await?;
    Ok(Reply::ok("Fetched successfully").data(documents_to_json(&days)))
}

/// One weekday (`0` Sunday to `6` Saturday) of one year, keyed by both.
pub async fn update_work_setting(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .numeric("year", "Year is required")
            .numeric("day", "Day is required")
            .required("workstatus", "Status is required"),
    )?;
    let year = body.int("year").ok_or(Reply::unprocessable("Year is required"))?;
    let day = body
        .int("day")
        .filter(|d| (0..=6).contains(d))
        .ok_or(Reply::unprocessable("Day is required"))?;
    let fields = doc! { "year": year, "day": day, "workstatus": body.flag("workstatus") };
    let changed = upsert(
        &state,
        Collection::CompanyWorkSetting,
        doc! { "year": year, "day": day, "leadid": ctx.lead_id },
        stamped(&ctx, fields),
    )
    .await?;
    if changed.is_some() && year == i64::from(next_year()) {
        refresh_holiday_flag(state.store.as_ref(), ctx.lead_id, next_year()).await;
    }
    Ok(updated(changed))
}

pub async fn get_holidays(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    Path(year): Path<String>,
) -> Result<Reply> {
    let year = year_param(&year)?;
    let Some((start, end)) = year_range(year) else {
        return Ok(Reply::unprocessable("Year is required"));
    };
    let mut filter = scoped(&ctx);
    filter.insert("holidaydate", doc! { "$gte": start, "$lte": end });
    let holidays = state
        .store
        .find(
            Collection::CompanyHoliday,
            filter,
            FindOptions::default()
                .projection(hide_scope())
                .sort(doc! { "holidaydate": 1 }),
        )
        .await?;
    Ok(Reply::ok("Fetched successfully").data(documents_to_json(&holidays)))
}

/// With `_id` the holiday is edited in place, otherwise it is keyed by date.
pub async fn update_holiday(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .required("holidaydate", "Date is required")
            .required("description", "Description is required")
            .optional_object_id("_id", "Id is required"),
    )?;
    let date = body
        .millis("holidaydate")
        .ok_or(Reply::unprocessable("Date is required"))?;
    let filter = match body.oid("_id") {
        Some(id) => doc! { "_id": id, "leadid": ctx.lead_id },
        None => doc! { "leadid": ctx.lead_id, "holidaydate": date },
    };
    let fields = doc! { "holidaydate": date, "description": body.text("description") };
    let changed = upsert(&state, Collection::CompanyHoliday, filter, stamped(&ctx, fields)).await?;

    let year = chrono::DateTime::from_timestamp_millis(date).map(|d| d.year());
    if changed.is_some() && year == Some(next_year()) {
        refresh_holiday_flag(state.store.as_ref(), ctx.lead_id, next_year()).await;
    }
    Ok(updated(changed))
}

/// Replace the `toYear` calendar with a copy of `fromYear`'s.
pub async fn clone_holidays(
    State(state): State<Arc<AppState>>,
    ctx: CapContext,
    body: JsonBody,
) -> Result<Reply> {
    body.check(
        &RuleSet::new()
            .numeric("fromYear", "From year is required")
            .numeric("toYear", "To year is required"),
    )?;
    let from = body
        .int("fromYear")
        .and_then(|y| i32::try_from(y).ok())
        .and_then(|y| year_range(y).map(|r| (y, r)));
    let to = body
        .int("toYear")
        .and_then(|y| i32::try_from(y).ok())
        .and_then(|y| year_range(y).map(|r| (y, r)));
    let Some((_, (from_start, from_end))) = from else {
        return Ok(Reply::unprocessable("From year is required"));
    };
    let Some((to_year, (to_start, to_end))) = to else {
        return Ok(Reply::unprocessable("To year is required"));
    };

    let mut filter = scoped(&ctx);
    filter.insert("holidaydate", doc! { "$gte": from_start, "$lte": from_end });
    let source = state
        .store
        .find(Collection::CompanyHoliday, filter, FindOptions::default())
        .await?;

    let actor = Bson::ObjectId(ctx.user_id);
    let mut retire = record::modified(&actor);
    retire.extend(doc! { "internalstatus": 0, "externalstatus": 0 });
    let retired = state
        .store
        .update_many(
            Collection::CompanyHoliday,
            doc! {
                "leadid": ctx.lead_id,
                "internalstatus": 1,
                "holidaydate": { "$gte": to_start, "$lte": to_end },
            },
            doc! { "$set": retire },
        )
        .await?;
    if retired.matched > 0 && retired.modified == 0 {
        return Ok(Reply::failure("Error in copying holidays"));
    }

    let copies: Vec<Document> = source
        .iter()
        .filter_map(|holiday| {
            let date = shift_to_year(record::int(holiday.get("holidaydate"))?, to_year)?;
            let mut copy = doc! {
                "holidaydate": date,
                "description": holiday.get("description").cloned().unwrap_or(Bson::Null),
                "leadid": ctx.lead_id,
            };
            copy.extend(created(&actor));
            Some(copy)
        })
        .collect();
    if !copies.is_empty() {
        state
            .store
            .insert_many(Collection::CompanyHoliday, copies)
            .await?;
    }
    if to_year == next_year() {
        refresh_holiday_flag(state.store.as_ref(), ctx.lead_id, to_year).await;
    }
    tracing::info!(lead_id = %ctx.lead_id, to_year, copied = source.len(), "Holidays copied");
    Ok(Reply::ok("Copied successfully"))
}
