//! Rendering tests for the statement builders.

use super::*;
use crate::expr::{count_all, exists};
use crate::schema::{Column, Model};
use crate::types::Operand;

fn users() -> Model {
    Model::new("users")
        .column("id", Column::integer().not_null())
        .column("name", Column::text())
        .column("team_id", Column::integer())
        .column("active", Column::boolean())
}

fn teams() -> Model {
    Model::new("teams")
        .column("id", Column::integer())
        .column("title", Column::text())
}

#[test]
fn test_select_basic() -> ForgeResult<()> {
    let u = users().alias("u");
    let q = from(u.clone())?
        .where_(u.col("active")?.eq(true)?)?
        .select([("id", u.col("id")?), ("name", u.col("name")?)])?
        .order_by(u.col("name")?, Order::Asc)?
        .limit(10)
        .offset(5);
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"SELECT "u"."id" AS "id", "u"."name" AS "name" FROM "users" AS "u" "#,
            r#"WHERE "u"."active" = $1::boolean ORDER BY "u"."name" ASC LIMIT 10 OFFSET 5"#
        )
    );
    let output: Vec<(&str, SqlType)> = q.output().iter().map(|c| (c.name.as_str(), c.ty)).collect();
    assert_eq!(output, [("id", SqlType::Integer), ("name", SqlType::Text)]);
    Ok(())
}

#[test]
fn test_select_distinct() -> ForgeResult<()> {
    let u = users().alias("u");
    let q = from(u.clone())?.select([("team", u.col("team_id")?)])?.distinct();
    assert_eq!(
        q.to_sql(),
        r#"SELECT DISTINCT "u"."team_id" AS "team" FROM "users" AS "u""#
    );
    Ok(())
}

#[test]
fn test_empty_projection_is_rejected() -> ForgeResult<()> {
    let u = users().alias("u");
    let err = from(u.clone())?.select(Vec::<(&str, Expr)>::new()).unwrap_err();
    assert!(matches!(err, ForgeError::EmptyProjection));

    let err = from(u.clone())?
        .select([("x", u.col("id")?), ("x", u.col("name")?)])
        .unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

#[test]
fn test_unknown_column() {
    let u = users().alias("u");
    let err = u.col("missing").unwrap_err();
    assert!(matches!(err, ForgeError::UnknownColumn { ref column, .. } if column == "missing"));
}

#[test]
fn test_where_conditions_are_anded() -> ForgeResult<()> {
    let u = users().alias("u");
    let q = from(u.clone())?
        .where_(u.col("active")?.eq(true)?)?
        .where_(u.col("id")?.gt(100)?)?
        .select([("id", u.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        r#"SELECT "u"."id" AS "id" FROM "users" AS "u" WHERE "u"."active" = $1::boolean AND "u"."id" > $2::integer"#
    );

    let err = from(u.clone())?.where_(u.col("id")?).unwrap_err();
    assert!(matches!(err, ForgeError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn test_joins() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let q = from(u.clone())?
        .left_join(t.clone(), u.col("team_id")?.eq(t.col("id")?)?)?
        .select([("name", u.col("name")?), ("team", t.col("title")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"SELECT "u"."name" AS "name", "t"."title" AS "team" FROM "users" AS "u" "#,
            r#"LEFT JOIN "teams" AS "t" ON "u"."team_id" = "t"."id""#
        )
    );

    let err = from(u.clone())?.join(t.clone(), t.col("id")?).unwrap_err();
    assert!(matches!(err, ForgeError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn test_group_by_having() -> ForgeResult<()> {
    let u = users().alias("u");
    let grouped = from(u.clone())?.group_by([u.col("team_id")?])?;
    let team = grouped.key(0)?;
    let q = grouped
        .having(count_all().gt(1)?)?
        .select([("team_id", team.clone()), ("n", count_all())])?
        .order_by(team, Order::Desc)?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"SELECT "u"."team_id" AS "team_id", count(*) AS "n" FROM "users" AS "u" "#,
            r#"GROUP BY "u"."team_id" HAVING count(*) > $1::bigint ORDER BY "u"."team_id" DESC"#
        )
    );
    assert_eq!(q.output()[1].ty, SqlType::Bigint);
    Ok(())
}

#[test]
fn test_grouped_select_requires_groupable_columns() -> ForgeResult<()> {
    let u = users().alias("u");
    let grouped = || -> ForgeResult<Grouped> { from(u.clone())?.group_by([u.col("team_id")?]) };

    let err = grouped()?.select([("name", u.col("name")?)]).unwrap_err();
    assert!(matches!(err, ForgeError::NotGroupable(_)));

    let err = grouped()?.having(u.col("id")?.gt(1)?).unwrap_err();
    assert!(matches!(err, ForgeError::NotGroupable(_)));

    let q = grouped()?.select([("n", count_all())])?;
    let err = q.order_by(u.col("name")?, Order::Asc).unwrap_err();
    assert!(matches!(err, ForgeError::NotGroupable(_)));

    assert!(grouped()?.key(3).is_err());
    assert!(from(u.clone())?.group_by(Vec::new()).is_err());
    Ok(())
}

#[test]
fn test_subquery_source() -> ForgeResult<()> {
    let u = users().alias("u");
    let s = from(u.clone())?.select([("id", u.col("id")?)])?.alias("s");
    let q = from(s.clone())?.select([("id", s.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        r#"SELECT "s"."id" AS "id" FROM (SELECT "u"."id" AS "id" FROM "users" AS "u") AS "s""#
    );
    Ok(())
}

#[test]
fn test_exists_correlated() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let sub = from(t.clone())?
        .where_(t.col("id")?.eq(u.col("team_id")?)?)?
        .select([("one", Expr::value(1, SqlType::Integer)?)])?;
    let q = from(u.clone())?
        .where_(exists(sub))?
        .select([("id", u.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"SELECT "u"."id" AS "id" FROM "users" AS "u" WHERE EXISTS "#,
            r#"(SELECT $1::integer AS "one" FROM "teams" AS "t" WHERE "t"."id" = "u"."team_id")"#
        )
    );
    Ok(())
}

// ==================== WITH ====================

#[test]
fn test_with_clause() -> ForgeResult<()> {
    let u = users().alias("u");
    let active = from(u.clone())?
        .where_(u.col("active")?.eq(true)?)?
        .select([("id", u.col("id")?)])?;
    let w = with("active_users", active.clone())?;
    let a = w.cte("active_users")?.alias("a");
    let q = w
        .from(a.clone())?
        .where_(a.col("id")?.lt(Expr::param("max", SqlType::Integer))?)?
        .select([("id", a.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"WITH "active_users" AS (SELECT "u"."id" AS "id" FROM "users" AS "u" WHERE "u"."active" = $1::boolean) "#,
            r#"SELECT "a"."id" AS "id" FROM "active_users" AS "a" WHERE "a"."id" < $2::integer"#
        )
    );
    assert_eq!(q.build()?.param_names(), ["max"]);

    let err = with("active_users", active.clone())?
        .with("active_users", active)
        .unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    assert!(With::new().cte("nope").is_err());
    Ok(())
}

#[test]
fn test_recursive_cte() -> ForgeResult<()> {
    let u = users().alias("u");
    let seed = from(u.clone())?
        .where_(u.col("id")?.eq(Expr::param("root", SqlType::Integer))?)?
        .select([("id", u.col("id")?), ("team_id", u.col("team_id")?)])?;
    let w = With::new().recursive("tree", seed, true, |tree| {
        let t = tree.alias("tree");
        let c = users().alias("c");
        from(c.clone())?
            .join(t.clone(), c.col("team_id")?.eq(t.col("id")?)?)?
            .select([("id", c.col("id")?), ("team_id", c.col("team_id")?)])
    })?;
    let tree = w.cte("tree")?.alias("tree");
    let q = w.from(tree.clone())?.select([("id", tree.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"WITH RECURSIVE "tree"("id", "team_id") AS ("#,
            r#"SELECT "u"."id" AS "id", "u"."team_id" AS "team_id" FROM "users" AS "u" WHERE "u"."id" = $1::integer "#,
            r#"UNION ALL "#,
            r#"SELECT "c"."id" AS "id", "c"."team_id" AS "team_id" FROM "users" AS "c" INNER JOIN "tree" ON "c"."team_id" = "tree"."id") "#,
            r#"SELECT "tree"."id" AS "id" FROM "tree""#
        )
    );
    Ok(())
}

#[test]
fn test_recursive_term_must_match_seed() -> ForgeResult<()> {
    let u = users().alias("u");
    let seed = from(u.clone())?.select([("id", u.col("id")?)])?;
    let err = With::new()
        .recursive("r", seed, false, |r| {
            let r = r.alias("r");
            from(r.clone())?.select([("id", r.col("id")?), ("again", r.col("id")?)])
        })
        .unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

// ==================== Set operations ====================

#[test]
fn test_set_operations() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let left = from(u.clone())?.select([("id", u.col("id")?)])?;
    let right = from(t.clone())?.select([("id", t.col("id")?)])?;

    let q = left.clone().union_all(right.clone())?.limit(3);
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"(SELECT "u"."id" AS "id" FROM "users" AS "u") UNION ALL "#,
            r#"(SELECT "t"."id" AS "id" FROM "teams" AS "t") LIMIT 3"#
        )
    );
    assert!(left.clone().except(right.clone())?.to_sql().contains(") EXCEPT ("));
    assert!(left.clone().intersect_all(right)?.to_sql().contains(") INTERSECT ALL ("));

    let wide = from(t.clone())?.select([("id", t.col("id")?), ("title", t.col("title")?)])?;
    assert!(matches!(left.clone().union(wide).unwrap_err(), ForgeError::Invalid(_)));

    let titles = from(t.clone())?.select([("title", t.col("title")?)])?;
    assert!(matches!(left.union(titles).unwrap_err(), ForgeError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn test_set_operation_keeps_left_with() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let w = with("x", from(u.clone())?.select([("id", u.col("id")?)])?)?;
    let x = w.cte("x")?.alias("x");
    let left = w.from(x.clone())?.select([("id", x.col("id")?)])?;
    let right = from(t.clone())?.select([("id", t.col("id")?)])?;
    assert_eq!(
        left.union(right)?.to_sql(),
        concat!(
            r#"WITH "x" AS (SELECT "u"."id" AS "id" FROM "users" AS "u") "#,
            r#"(SELECT "x"."id" AS "id" FROM "x") UNION (SELECT "t"."id" AS "id" FROM "teams" AS "t")"#
        )
    );
    Ok(())
}

// ==================== INSERT ====================

#[test]
fn test_insert_values() -> ForgeResult<()> {
    let ins = insert_into(users().alias("u"))?
        .values([("id", Operand::from(1)), ("name", "ann".into())])?
        .values([("name", Operand::from("bob")), ("id", 2.into())])?
        .returning(&["id"])?;
    assert_eq!(
        ins.to_sql(),
        r#"INSERT INTO "users" AS "u" ("id", "name") VALUES ($1::integer, $2::text), ($3::integer, $4::text) RETURNING "u"."id""#
    );
    let values = ins.build()?.bind(&Bindings::new())?;
    assert_eq!(
        values,
        [Value::Int(1), Value::from("ann"), Value::Int(2), Value::from("bob")]
    );
    assert_eq!(ins.output()[0].name, "id");
    Ok(())
}

#[test]
fn test_insert_row_shape_errors() -> ForgeResult<()> {
    let base = || insert_into(users().alias("u"));

    let err = base()?
        .values([("id", 1)])?
        .values([("name", "x")])
        .unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));

    let err = base()?.values([("nope", 1)]).unwrap_err();
    assert!(matches!(err, ForgeError::UnknownColumn { .. }));

    let err = base()?.values([("id", "abc")]).unwrap_err();
    assert!(err.is_ambiguous());

    let err = base()?.values([("id", 1), ("id", 2)]).unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

#[test]
fn test_insert_default_values_and_select() -> ForgeResult<()> {
    let u = users().alias("u");
    assert_eq!(
        insert_into(u.clone())?.to_sql(),
        r#"INSERT INTO "users" AS "u" DEFAULT VALUES"#
    );

    let t = teams().alias("t");
    let src = from(t.clone())?.select([("id", t.col("id")?), ("name", t.col("title")?)])?;
    let ins = insert_into(u.clone())?.from_select(["id", "name"], src)?;
    assert_eq!(
        ins.to_sql(),
        r#"INSERT INTO "users" AS "u" ("id", "name") SELECT "t"."id" AS "id", "t"."title" AS "name" FROM "teams" AS "t""#
    );

    let bad = from(t.clone())?.select([("id", t.col("title")?)])?;
    assert!(insert_into(u.clone())?.from_select(["id"], bad).is_err());

    let sub = from(t.clone())?.select([("id", t.col("id")?)])?.alias("s");
    assert!(matches!(insert_into(sub).unwrap_err(), ForgeError::Invalid(_)));
    Ok(())
}

// ==================== UPDATE ====================

#[test]
fn test_update_basic() -> ForgeResult<()> {
    let u = users().alias("u");
    let upd = update(u.clone())?
        .set("name", "zed")?
        .set("active", false)?
        .set("name", "amy")?
        .where_(u.col("id")?.eq(Expr::param("id", SqlType::Integer))?)?;
    assert_eq!(
        upd.to_sql(),
        r#"UPDATE "users" AS "u" SET "name" = $1::text, "active" = $2::boolean WHERE "u"."id" = $3::integer"#
    );

    let compiled = upd.build()?;
    let values = compiled.bind(&Bindings::new().set("id", 3))?;
    assert_eq!(values, [Value::from("amy"), Value::Bool(false), Value::Int(3)]);

    assert!(matches!(
        compiled.bind(&Bindings::new()).unwrap_err(),
        ForgeError::MissingParam(ref n) if n == "id"
    ));
    assert!(matches!(
        compiled.bind(&Bindings::new().set("id", 3).set("extra", 1)).unwrap_err(),
        ForgeError::UnexpectedParam(ref n) if n == "extra"
    ));
    assert!(matches!(
        compiled.bind(&Bindings::new().set("id", "three")).unwrap_err(),
        ForgeError::TypeMismatch { .. }
    ));
    Ok(())
}

#[test]
fn test_update_from_and_expressions() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let upd = update(u.clone())?
        .set("id", u.col("id")?.add(1)?)?
        .using(t.clone())?
        .where_(u.col("team_id")?.eq(t.col("id")?)?)?;
    assert_eq!(
        upd.to_sql(),
        r#"UPDATE "users" AS "u" SET "id" = "u"."id" + $1::integer FROM "teams" AS "t" WHERE "u"."team_id" = "t"."id""#
    );
    Ok(())
}

#[test]
fn test_update_requires_set() -> ForgeResult<()> {
    let err = update(users().alias("u"))?.build().unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

#[test]
fn test_group_key_with_constant_renders_identically() -> ForgeResult<()> {
    let u = users().alias("u");
    let grouped = from(u.clone())?.group_by([u.col("team_id")?.add(1)?])?;
    let bucket = grouped.key(0)?;
    let q = grouped
        .having(bucket.gt(2)?)?
        .select([("bucket", bucket.clone()), ("n", count_all())])?
        .order_by(bucket, Order::Asc)?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"SELECT "u"."team_id" + $1::integer AS "bucket", count(*) AS "n" FROM "users" AS "u" "#,
            r#"GROUP BY "u"."team_id" + $1::integer HAVING "u"."team_id" + $1::integer > $2::integer "#,
            r#"ORDER BY "u"."team_id" + $1::integer ASC"#
        )
    );
    assert_eq!(q.build()?.slots().len(), 2);
    Ok(())
}

// ==================== DELETE ====================

#[test]
fn test_delete_without_where_needs_opt_in() -> ForgeResult<()> {
    let u = users().alias("u");
    let err = delete_from(u.clone())?.build().unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));

    let all = delete_from(u.clone())?.allow_delete_all(true);
    assert_eq!(all.build()?.sql(), r#"DELETE FROM "users" AS "u""#);

    let err = delete_from(u.clone())?.returning(&["id"])?.alias("gone").unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

#[test]
fn test_delete_returning() -> ForgeResult<()> {
    let u = users().alias("u");
    let del = delete_from(u.clone())?
        .where_(u.col("active")?.eq(false)?)?
        .returning(&["id", "name"])?;
    assert_eq!(
        del.to_sql(),
        r#"DELETE FROM "users" AS "u" WHERE "u"."active" = $1::boolean RETURNING "u"."id", "u"."name""#
    );
    assert!(del.returning(&["nope"]).is_err());
    Ok(())
}

// ==================== DML as a source ====================

#[test]
fn test_dml_source_is_hoisted_into_with() -> ForgeResult<()> {
    let u = users().alias("u");
    let gone = delete_from(u.clone())?
        .where_(u.col("active")?.eq(false)?)?
        .returning(&["id", "team_id"])?
        .alias("gone")?;
    let q = from(gone.clone())?
        .where_(gone.col("team_id")?.eq(7)?)?
        .select([("id", gone.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"WITH "gone" AS (DELETE FROM "users" AS "u" WHERE "u"."active" = $1::boolean RETURNING "u"."id", "u"."team_id") "#,
            r#"SELECT "gone"."id" AS "id" FROM "gone" WHERE "gone"."team_id" = $2::integer"#
        )
    );
    Ok(())
}

#[test]
fn test_dml_source_inside_subquery_is_lifted_to_top() -> ForgeResult<()> {
    let u = users().alias("u");
    let gone = delete_from(u.clone())?
        .where_(u.col("active")?.eq(false)?)?
        .returning(&["id"])?
        .alias("gone")?;
    let s = from(gone.clone())?
        .select([("id", gone.col("id")?)])?
        .alias("s");
    let q = from(s.clone())?
        .where_(s.col("id")?.gt(3)?)?
        .select([("id", s.col("id")?)])?;
    assert_eq!(
        q.to_sql(),
        concat!(
            r#"WITH "gone" AS (DELETE FROM "users" AS "u" WHERE "u"."active" = $1::boolean RETURNING "u"."id") "#,
            r#"SELECT "s"."id" AS "id" FROM (SELECT "gone"."id" AS "id" FROM "gone") AS "s" "#,
            r#"WHERE "s"."id" > $2::integer"#
        )
    );
    Ok(())
}

#[test]
fn test_dml_source_inside_exists_and_cte_is_lifted() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let moved = update(u.clone())?
        .set("team_id", 2)?
        .where_(u.col("team_id")?.eq(1)?)?
        .returning(&["team_id"])?
        .alias("moved")?;
    let touched = from(moved.clone())?
        .where_(moved.col("team_id")?.eq(t.col("id")?)?)?
        .select([("team_id", moved.col("team_id")?)])?;

    let w = with("kept", from(t.clone())?.select([("id", t.col("id")?)])?)?;
    let kept = w.cte("kept")?.alias("k");
    let q = w
        .from(t.clone())?
        .where_(exists(touched))?
        .where_(t.col("id")?.in_query(from(kept.clone())?.select([("id", kept.col("id")?)])?)?)?
        .select([("title", t.col("title")?)])?;
    let sql = q.to_sql();
    assert!(sql.starts_with(concat!(
        r#"WITH "moved" AS (UPDATE "users" AS "u" SET "team_id" = $1::integer "#,
        r#"WHERE "u"."team_id" = $2::integer RETURNING "u"."team_id"), "#,
        r#""kept" AS (SELECT "t"."id" AS "id" FROM "teams" AS "t") SELECT "#
    )), "{sql}");
    assert_eq!(sql.matches("WITH").count(), 1);
    assert!(sql.contains(r#"EXISTS (SELECT "moved"."team_id" AS "team_id" FROM "moved" WHERE"#));
    Ok(())
}

#[test]
fn test_dml_source_needs_returning() -> ForgeResult<()> {
    let u = users().alias("u");
    let err = update(u.clone())?.set("active", true)?.alias("x").unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));

    let err = with("x", delete_from(u.clone())?).unwrap_err();
    assert!(matches!(err, ForgeError::Invalid(_)));
    Ok(())
}

#[test]
fn test_inserted_rows_join() -> ForgeResult<()> {
    let u = users().alias("u");
    let t = teams().alias("t");
    let added = insert_into(u.clone())?
        .values([("id", Operand::from(9)), ("team_id", 1.into())])?
        .returning(&["id", "team_id"])?
        .alias("added")?;
    let q = from(t.clone())?
        .join(added.clone(), added.col("team_id")?.eq(t.col("id")?)?)?
        .select([("team", t.col("title")?), ("user_id", added.col("id")?)])?;
    let sql = q.to_sql();
    assert!(sql.starts_with(r#"WITH "added" AS (INSERT INTO "users" AS "u" ("id", "team_id") VALUES ($1::integer, $2::integer) RETURNING"#));
    assert!(sql.ends_with(r#"FROM "teams" AS "t" INNER JOIN "added" ON "added"."team_id" = "t"."id""#));
    Ok(())
}
