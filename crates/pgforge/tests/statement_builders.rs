//! End-to-end statement rendering through the public API.
//!
//! These tests do not touch a database; they check the SQL text and the
//! positional arguments a statement would be sent with.

use pgforge::prelude::*;
use pgforge::{ForgeError, Select};

fn orders() -> Model {
    Model::new("orders")
        .column("id", Column::bigserial().not_null())
        .column("customer_id", Column::bigint().not_null())
        .column("status", Column::enumeration(["open", "paid", "void"]).not_null())
        .column("total", Column::numeric(Some(12), Some(2)))
        .column("placed_on", Column::date())
        .primary_key(&["id"])
        .unwrap()
}

fn customers() -> Model {
    Model::new("customers")
        .column("id", Column::bigserial().not_null())
        .column("email", Column::varchar(Some(255)).not_null())
        .column("vip", Column::boolean())
        .primary_key(&["id"])
        .unwrap()
}

#[test]
fn report_query_with_join_group_and_params() -> ForgeResult<()> {
    let o = orders().alias("o");
    let c = customers().alias("c");

    let grouped = stmt::from(o.clone())?
        .join(c.clone(), o.col("customer_id")?.eq(c.col("id")?)?)?
        .where_(o.col("placed_on")?.gte(Expr::param("since", SqlType::Date))?)?
        .where_(o.col("status")?.ne("void")?)?
        .group_by([c.col("email")?])?;
    let email = grouped.key(0)?;
    let total = sum(&o.col("total")?)?;
    let query = grouped
        .having(count_all().gte(Expr::param("min_orders", SqlType::Bigint))?)?
        .select([("email", email), ("spent", total.clone()), ("orders", count_all())])?
        .order_by(total, Order::Desc)?
        .limit(20);

    assert_eq!(
        query.to_sql(),
        concat!(
            r#"SELECT "c"."email" AS "email", sum("o"."total") AS "spent", count(*) AS "orders" "#,
            r#"FROM "orders" AS "o" INNER JOIN "customers" AS "c" ON "o"."customer_id" = "c"."id" "#,
            r#"WHERE "o"."placed_on" >= $1::date AND "o"."status" <> $2 "#,
            r#"GROUP BY "c"."email" HAVING count(*) >= $3::bigint "#,
            r#"ORDER BY sum("o"."total") DESC LIMIT 20"#
        )
    );

    let compiled = query.build()?;
    assert_eq!(compiled.param_names(), ["since", "min_orders"]);
    let args = compiled.bind(
        &Bindings::new()
            .set("since", "2024-01-01")
            .set("min_orders", 3),
    )?;
    assert_eq!(args.len(), 3);
    assert_eq!(args[1], Value::from("void"));
    assert_eq!(args[2], Value::from(3));
    assert!(matches!(args[0], Value::Date(_)));
    Ok(())
}

#[test]
fn malformed_date_binding_is_rejected() -> ForgeResult<()> {
    let o = orders().alias("o");
    let query = stmt::from(o.clone())?
        .where_(o.col("placed_on")?.eq(Expr::param("day", SqlType::Date))?)?
        .select([("id", o.col("id")?)])?;
    let err = query
        .build()?
        .bind(&Bindings::new().set("day", "2024-13-45"))
        .unwrap_err();
    assert!(matches!(err, ForgeError::MalformedLiteral { .. }));
    Ok(())
}

#[test]
fn upsert_style_pipeline_through_ctes() -> ForgeResult<()> {
    let o = orders().alias("o");
    let c = customers().alias("c");

    let voided = stmt::update(o.clone())?
        .set("status", "void")?
        .where_(o.col("status")?.eq("open")?)?
        .where_(o.col("placed_on")?.lt("2020-01-01")?)?
        .returning(&["id", "customer_id"])?
        .alias("voided")?;

    let query = stmt::from(c.clone())?
        .where_(c.col("id")?.in_query(
            stmt::from(voided.clone())?.select([("customer_id", voided.col("customer_id")?)])?,
        )?)?
        .select([("email", c.col("email")?)])?;

    let sql = query.to_sql();
    assert!(sql.starts_with(concat!(
        r#"WITH "voided" AS (UPDATE "orders" AS "o" SET "status" = $1 "#,
        r#"WHERE "o"."status" = $2 AND "o"."placed_on" < $3::date "#,
        r#"RETURNING "o"."id", "o"."customer_id") "#
    )));
    assert!(sql.contains(r#"FROM "customers" AS "c" WHERE "c"."id" IN (SELECT"#));
    Ok(())
}

#[test]
fn shared_base_can_be_extended_independently() -> ForgeResult<()> {
    let c = customers().alias("c");
    let base = stmt::from(c.clone())?.where_(c.col("vip")?.is_true()?)?;

    let emails: Select = base.clone().select([("email", c.col("email")?)])?;
    let ids: Select = base
        .where_(c.col("id")?.gt(100)?)?
        .select([("id", c.col("id")?)])?;

    assert_eq!(
        emails.to_sql(),
        r#"SELECT "c"."email" AS "email" FROM "customers" AS "c" WHERE "c"."vip" IS TRUE"#
    );
    assert_eq!(
        ids.to_sql(),
        r#"SELECT "c"."id" AS "id" FROM "customers" AS "c" WHERE "c"."vip" IS TRUE AND "c"."id" > $1::bigint"#
    );
    Ok(())
}

#[test]
fn insert_then_select_returning_rows() -> ForgeResult<()> {
    let c = customers().alias("c");
    let added = stmt::insert_into(c.clone())?
        .values([("email", "a@example.com")])?
        .values([("email", "b@example.com")])?
        .returning(&["id"])?;
    assert_eq!(
        added.to_sql(),
        r#"INSERT INTO "customers" AS "c" ("email") VALUES ($1::text), ($2::text) RETURNING "c"."id""#
    );
    assert_eq!(added.output()[0].ty, SqlType::Bigint);
    Ok(())
}

#[test]
fn delete_requires_explicit_opt_in_to_remove_everything() -> ForgeResult<()> {
    let o = orders().alias("o");
    let unguarded = stmt::delete_from(o.clone())?;
    assert!(matches!(unguarded.build(), Err(ForgeError::Invalid(_))));

    let everything = stmt::delete_from(o)?.allow_delete_all(true);
    assert_eq!(everything.build()?.sql(), r#"DELETE FROM "orders" AS "o""#);
    Ok(())
}

#[test]
fn grouping_by_an_expression_with_a_literal() -> ForgeResult<()> {
    let o = orders().alias("o");
    let grouped = stmt::from(o.clone())?.group_by([o.col("customer_id")?.rem(10)?])?;
    let shard = grouped.key(0)?;
    let query = grouped
        .select([("shard", shard.clone()), ("orders", count_all())])?
        .order_by(shard, Order::Asc)?;
    assert_eq!(
        query.to_sql(),
        concat!(
            r#"SELECT "o"."customer_id" % $1::bigint AS "shard", count(*) AS "orders" FROM "orders" AS "o" "#,
            r#"GROUP BY "o"."customer_id" % $1::bigint ORDER BY "o"."customer_id" % $1::bigint ASC"#
        )
    );
    assert_eq!(query.build()?.bind(&Bindings::new())?, [Value::from(10)]);
    Ok(())
}
