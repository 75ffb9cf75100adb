//! Rendering of source queries against derived entity mappings.

use sqlbulk_core::{Error, Value};
use sqlbulk_macros::{Entity, Projection};
use sqlbulk_query::{Expr, Predicate, Query, SelectList};
use sqlbulk_schema::{ContextTableMappings, DbContext, MetadataFactory, ModelBuilder};

#[derive(Debug, Clone, Entity)]
#[bulk(table = "users")]
struct User {
    #[bulk(primary_key, identity)]
    id: Option<i64>,
    name: String,
    age: i64,
    is_active: bool,
    #[bulk(foreign_key = "teams.id")]
    team_id: Option<i64>,
}

#[derive(Debug, Clone, Entity)]
#[bulk(table = "teams")]
struct Team {
    #[bulk(primary_key, identity)]
    id: Option<i64>,
    title: String,
}

#[derive(Debug, Clone, Entity)]
#[bulk(table = "orphans")]
struct Orphan {
    #[bulk(primary_key)]
    id: i64,
}

#[derive(Debug, Clone, Projection)]
struct UserSummary {
    id: i64,
    #[bulk(target = "name")]
    label: String,
}

#[derive(Debug, Clone, Projection)]
struct TeamSize {
    team_id: i64,
    members: i64,
}

struct Company;

impl DbContext for Company {
    const NAME: &'static str = "company";

    fn configure(model: &mut ModelBuilder) {
        model.entity::<User>().entity::<Team>();
    }
}

fn mappings() -> ContextTableMappings {
    MetadataFactory::build_mappings::<Company>().unwrap()
}

#[test]
fn joined_query_qualifies_and_binds_everything() {
    let mappings = mappings();
    let query = Query::<User>::new()
        .inner_join::<Team>(Team::id.eq(User::team_id))
        .filter(Team::title.eq("core"))
        .filter(User::age.ge(18))
        .order_by(User::name.asc())
        .limit(10);

    let fragment = query.parts().render(&mappings, SelectList::RootKey).unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT \"users\".\"id\" FROM \"users\" INNER JOIN \"teams\" ON \"teams\".\"id\" = \"users\".\"team_id\" \
         WHERE \"teams\".\"title\" = @p0 AND \"users\".\"age\" >= @p1 ORDER BY \"users\".\"name\" ASC LIMIT @p2"
    );
    let values: Vec<_> = fragment.params().iter().map(|(_, v)| v.clone()).collect();
    assert_eq!(
        values,
        [Value::Text("core".into()), Value::Int(18), Value::BigInt(10)]
    );

    let (positional, _) = fragment.to_positional().unwrap();
    assert!(positional.ends_with("ASC LIMIT ?3"));
}

#[test]
fn projection_renders_in_requested_order() {
    let mappings = mappings();
    let select = Query::<User>::new()
        .filter(User::is_active.is_true())
        .select::<UserSummary>()
        .bind(UserSummary::id, User::id)
        .bind(UserSummary::label, User::name.upper());

    let fragment = select
        .render_ordered(&mappings, "archive", &["label", "id"])
        .unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT UPPER(\"name\") AS \"label\", \"id\" AS \"id\" FROM \"users\" WHERE \"is_active\""
    );
}

#[test]
fn unbound_output_is_a_shape_error() {
    let mappings = mappings();
    let select = Query::<User>::new()
        .select::<UserSummary>()
        .bind(UserSummary::id, User::id);
    let err = select.render(&mappings).unwrap_err();
    match err {
        Error::ProjectionShape(e) => {
            assert_eq!(e.expected, 2);
            assert_eq!(e.actual, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn grouping_and_having() {
    let mappings = mappings();
    let select = Query::<User>::new()
        .group_by(User::team_id)
        .having(Predicate::<User>::new(User::age.count().gt(2)))
        .select::<TeamSize>()
        .bind(TeamSize::team_id, User::team_id)
        .bind_expr(TeamSize::members, Expr::count_star());

    let fragment = select.render(&mappings).unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT \"team_id\" AS \"team_id\", COUNT(*) AS \"members\" FROM \"users\" \
         GROUP BY \"team_id\" HAVING COUNT(\"age\") > @p0"
    );
}

#[test]
fn aggregates_are_rejected_in_where() {
    let mappings = mappings();
    let query =
        Query::<User>::new().filter(Predicate::<User>::new(User::age.sum().gt(100)));
    let err = query.parts().render(&mappings, SelectList::Count).unwrap_err();
    assert!(matches!(err, Error::Translation(_)));
}

#[test]
fn offset_without_limit() {
    let mappings = mappings();
    let query = Query::<Team>::new().offset(5);
    let fragment = query.parts().render(&mappings, SelectList::Count).unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT COUNT(*) FROM \"teams\" LIMIT -1 OFFSET @p0"
    );
}

#[test]
fn unmapped_root_is_a_configuration_error() {
    let mappings = mappings();
    let query = Query::<Orphan>::new().filter(Orphan::id.eq(1));
    let err = query.parts().render(&mappings, SelectList::RootKey).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn bounded_only_with_a_real_filter() {
    assert!(!Query::<User>::new().parts().is_bounded());
    assert!(!Query::<User>::new().filter(Predicate::<User>::all()).parts().is_bounded());
    assert!(Query::<User>::new().filter(!User::is_active).parts().is_bounded());
}

#[test]
fn arithmetic_keeps_sqlite_precedence() {
    let mappings = mappings();
    let query = Query::<User>::new()
        .filter(Predicate::<User>::new(
            User::age.expr().neg().modulo(7).lt(User::id.expr().div(2)),
        ))
        .filter(Predicate::<User>::new(
            User::name.expr().concat("!").not_like("%x%"),
        ));

    let fragment = query.parts().render(&mappings, SelectList::Count).unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT COUNT(*) FROM \"users\" WHERE -\"age\" % @p0 < \"id\" / @p1 \
         AND \"name\" || @p2 NOT LIKE @p3"
    );
    assert_eq!(fragment.params().len(), 4);
}

#[test]
fn left_join_finds_missing_parents() {
    let mappings = mappings();
    let parts = Query::<User>::new()
        .left_join::<Team>(Team::id.eq(User::team_id))
        .filter(Team::id.is_null())
        .into_parts();

    let fragment = parts.render(&mappings, SelectList::RootKey).unwrap();
    assert_eq!(
        fragment.sql(),
        "SELECT \"users\".\"id\" FROM \"users\" LEFT JOIN \"teams\" ON \"teams\".\"id\" = \"users\".\"team_id\" \
         WHERE \"teams\".\"id\" IS NULL"
    );
    assert!(fragment.params().is_empty());
}
