use super::{lenient_i32, season_in_range, team_code};
use crate::database::RowSource;
use crate::error::ToolError;
use crate::query::{
    assemble, compose_score, run_search, BaseQuery, Cell, Column, ColumnExpr, FilterBuilder,
    OrderBy, OutputRecord,
};
use serde::Deserialize;
use serde_json::Value;
use std::ops::RangeInclusive;
use tracing::{error, info, warn};

/// Seasons covered by the play-by-play game tables.
pub const GAME_SEASONS: RangeInclusive<i32> = 2001..=2024;

const GAME_YEAR: ColumnExpr = ColumnExpr::YearOf("game.game_date");
const GAME_TEAMS: &[ColumnExpr] = &[
    ColumnExpr::Column("game.team_home"),
    ColumnExpr::Column("game.team_visiting"),
];

const GAME_COLUMNS: &[Column] = &[
    Column::new("game_id", "game.game_id"),
    Column::new("game_date", "game.game_date"),
    Column::new("t_home_code", "t_home.team_code"),
    Column::new("t_visitor_code", "t_visitor.team_code"),
    Column::new("score_visitor", "game.score_visitor"),
    Column::new("score_home", "game.score_home"),
    Column::new(
        "num_plays",
        "(SELECT count(*) FROM game_play WHERE game_play.game_id = game.game_id)",
    ),
];

const GAME_QUERY: BaseQuery = BaseQuery {
    columns: GAME_COLUMNS,
    from: "game, team t_home, team t_visitor",
    joins: &[
        "game.team_home = t_home.team_code",
        "date_part('year', game.game_date) = t_home.season_year",
        "game.team_visiting = t_visitor.team_code",
        "date_part('year', game.game_date) = t_visitor.season_year",
    ],
    order_by: &[OrderBy::desc("game.game_date"), OrderBy::asc("game.game_id")],
};

const SCHEDULE_COLUMNS: &[Column] = &[
    Column::new("game_date", "game.game_date"),
    Column::new("team_home", "game.team_home"),
    Column::new("team_visiting", "game.team_visiting"),
    Column::new("score_home", "game.score_home"),
    Column::new("score_visitor", "game.score_visitor"),
];

const SCHEDULE_QUERY: BaseQuery = BaseQuery {
    columns: SCHEDULE_COLUMNS,
    from: "game",
    joins: &[],
    order_by: &[
        OrderBy::asc("game.game_date"),
        OrderBy::asc("game.game_time"),
        OrderBy::asc("game.game_id"),
    ],
};

#[derive(Debug, Default, Deserialize)]
pub struct GameSearch {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    pub team_code_1: Option<String>,
    pub team_code_2: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    pub team_code: Option<String>,
}

/// Individual games for one team, or between two teams, in one season.
pub async fn search_games(
    source: &dyn RowSource,
    search: GameSearch,
) -> Result<Vec<OutputRecord>, ToolError> {
    info!(
        "Performing Game Search. Year={:?} TeamCode1={:?} TeamCode2={:?}",
        search.year, search.team_code_1, search.team_code_2
    );

    let year = match search.year {
        Some(year) if GAME_SEASONS.contains(&year) => year,
        other => {
            error!("Illegal value for year: {:?}", other);
            return Err(ToolError::invalid(format!(
                "Illegal value for year: {:?}. Games are available for {} through {}",
                other,
                GAME_SEASONS.start(),
                GAME_SEASONS.end()
            )));
        }
    };
    let first = team_code("team_code_1", search.team_code_1.as_deref())?;
    // Without a second team both conditions would name the same team.
    let second = match search.team_code_2.as_deref() {
        Some(code) if !code.trim().is_empty() => Some(team_code("team_code_2", Some(code))?),
        _ => None,
    };

    let fragments = FilterBuilder::new()
        .equals_int(GAME_YEAR, Some(year))
        .equals_any(GAME_TEAMS, Some(first.as_str()))
        .equals_any(GAME_TEAMS, second.as_deref())
        .build()?;
    let query = assemble(&GAME_QUERY, fragments);

    run_search(source, &query, |row| {
        Ok(OutputRecord::new()
            .field("Visitors", row.get("t_visitor_code")?.to_json())
            .field("Home", row.get("t_home_code")?.to_json())
            .field(
                "Score",
                compose_score(row.get("score_visitor")?, row.get("score_home")?),
            )
            .field("Play Count", row.get("num_plays")?.to_json()))
    })
    .await
}

/// Season schedule and results from one team's point of view.
///
/// A season outside the record books is reported as having no games rather
/// than failing, the same answer an unknown team gets from the data store.
pub async fn schedule_and_record(
    source: &dyn RowSource,
    request: ScheduleRequest,
) -> Result<Vec<OutputRecord>, ToolError> {
    info!(
        "Performing Schedule and Record Lookup. Year={:?} TeamCode={:?}",
        request.year, request.team_code
    );

    let year = request.year.ok_or_else(|| {
        error!("Both Team Code and Year are required fields.");
        ToolError::invalid("year is required")
    })?;
    let team = team_code("team_code", request.team_code.as_deref())?;
    if let Err(e) = season_in_range(year) {
        warn!("No schedule for {} in {}, returning no games. {}", team, year, e);
        return Ok(Vec::new());
    }

    let fragments = FilterBuilder::new()
        .equals_int(GAME_YEAR, Some(year))
        .equals_any(GAME_TEAMS, Some(team.as_str()))
        .build()?;
    let query = assemble(&SCHEDULE_QUERY, fragments);

    let records = run_search(source, &query, |row| {
        let at_home = row.get("team_home")?.as_str() == Some(team.as_str());
        let (opponent, runs, runs_against) = if at_home {
            (
                row.get("team_visiting")?,
                row.get("score_home")?,
                row.get("score_visitor")?,
            )
        } else {
            (
                row.get("team_home")?,
                row.get("score_visitor")?,
                row.get("score_home")?,
            )
        };
        let date = match row.get("game_date")? {
            Cell::Date(date) => Value::from(date.format("%m-%d-%Y").to_string()),
            other => other.to_json(),
        };
        Ok(OutputRecord::new()
            .field("Date", date)
            .field("Opponent", opponent.to_json())
            .field("Home/Away", if at_home { "Home" } else { "@" })
            .field("Win/Loss", decision(runs, runs_against))
            .field("Score", compose_score(runs, runs_against)))
    })
    .await?;

    if records.is_empty() {
        warn!("No games recorded for {} in {}", team, year);
    }
    Ok(records)
}

fn decision(runs: &Cell, runs_against: &Cell) -> Value {
    match (runs.as_i64(), runs_against.as_i64()) {
        (Some(r), Some(ra)) if r > ra => Value::from("W"),
        (Some(r), Some(ra)) if r < ra => Value::from("L"),
        (Some(_), Some(_)) => Value::from("T"),
        _ => Value::Null,
    }
}
