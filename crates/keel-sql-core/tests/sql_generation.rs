//! SQL fixtures per dialect.
//!
//! Each test extracts a model from a derived record and asserts the exact
//! statement text and argument order a dialect renders for it.

use keel_sql_core::params;
use keel_sql_core::prelude::*;
use keel_sql_derive::Record;

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Default, Record)]
struct SqlGenModel {
    #[column("pk")]
    prim: i64,
    first: String,
    last: String,
    amount: i32,
}

#[derive(Debug, Default, Record)]
struct WithoutPk {
    first: String,
    last: String,
    amount: i32,
}

#[derive(Debug, Default, Record)]
struct User {
    id: i64,
    #[column("size:64")]
    name: String,
}

#[derive(Debug, Default, Record)]
struct Post {
    id: i64,
    #[column("fk:author")]
    author_id: i64,
    author: Option<Box<User>>,
    content: String,
}

#[derive(Debug, Default, Record)]
struct Student {
    id: i64,
    name: String,
    grade: i32,
    score: i32,
}

#[derive(Debug, Default, Record)]
struct Typed {
    id: i64,
    #[column("size:128")]
    name: String,
    #[column("notnull,default:0")]
    state: i64,
    #[column("coltype:text")]
    body: String,
    active: bool,
    ratio: f64,
    payload: Vec<u8>,
    seen: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Record)]
struct Unsupported {
    id: i64,
    #[column("coltype:jsonb")]
    doc: String,
}

#[derive(Debug, Default, Record)]
struct Code {
    #[column("pk,size:16")]
    code: String,
    label: String,
}

fn model<R: Record>(mut record: R) -> Model {
    Extractor::default().extract(&mut record, true, &[]).unwrap()
}

fn sql_gen(prim: i64) -> Model {
    model(SqlGenModel {
        prim,
        first: "a".into(),
        last: "b".into(),
        amount: 3,
    })
}

fn by_pk(model: Model, dialect: &dyn Dialect) -> Criteria {
    let mut criteria = Criteria::new(model);
    criteria.merge_pk_condition(dialect, false);
    criteria
}

// =============================================================================
// CREATE TABLE
// =============================================================================

#[test]
fn test_create_table_postgres() {
    let d = Postgres::new();
    assert_eq!(
        d.create_table_sql(&sql_gen(0), true).unwrap(),
        vec![
            r#"CREATE TABLE IF NOT EXISTS "sql_gen_model" ( "prim" bigserial PRIMARY KEY, "first" text, "last" text, "amount" integer )"#
        ]
    );
    assert_eq!(
        d.create_table_sql(&model(WithoutPk::default()), true).unwrap(),
        vec![r#"CREATE TABLE IF NOT EXISTS "without_pk" ( "first" text, "last" text, "amount" integer )"#]
    );
}

#[test]
fn test_create_table_mysql() {
    let d = Mysql::new();
    assert_eq!(
        d.create_table_sql(&sql_gen(0), false).unwrap(),
        vec![
            "CREATE TABLE `sql_gen_model` ( `prim` bigint PRIMARY KEY AUTO_INCREMENT, `first` longtext, `last` longtext, `amount` int )"
        ]
    );
}

#[test]
fn test_create_table_sqlite() {
    let d = Sqlite::new();
    assert_eq!(
        d.create_table_sql(&sql_gen(0), true).unwrap(),
        vec![
            "CREATE TABLE IF NOT EXISTS `sql_gen_model` ( `prim` integer PRIMARY KEY AUTOINCREMENT NOT NULL, `first` text, `last` text, `amount` integer )"
        ]
    );
    assert_eq!(
        d.create_table_sql(&model(Code::default()), true).unwrap(),
        vec!["CREATE TABLE IF NOT EXISTS `code` ( `code` text PRIMARY KEY NOT NULL, `label` text )"]
    );
}

#[test]
fn test_create_table_oracle_adds_sequence_and_trigger() {
    let d = Oracle::new();
    let statements = d.create_table_sql(&sql_gen(0), true).unwrap();
    assert_eq!(
        statements,
        vec![
            r#"CREATE TABLE "sql_gen_model" ( "prim" NUMBER(16) PRIMARY KEY NOT NULL, "first" CLOB, "last" CLOB, "amount" NUMBER )"#.to_string(),
            "CREATE SEQUENCE sql_gen_model_prim_seq MINVALUE 1 NOMAXVALUE START WITH 1 INCREMENT BY 1 NOCACHE CYCLE".to_string(),
            r#"CREATE TRIGGER sql_gen_model_prim_trigger BEFORE INSERT ON "sql_gen_model" FOR EACH ROW WHEN (new."prim" IS NULL) BEGIN SELECT sql_gen_model_prim_seq.NEXTVAL INTO :new."prim" FROM dual; END;"#.to_string(),
        ]
    );

    // String keys need no sequence.
    assert_eq!(
        d.create_table_sql(&model(Code::default()), true).unwrap(),
        vec![r#"CREATE TABLE "code" ( "code" VARCHAR2(16) PRIMARY KEY NOT NULL, "label" CLOB )"#]
    );
}

#[test]
fn test_create_table_with_foreign_key() {
    let d = Postgres::new();
    assert_eq!(
        d.create_table_sql(&model(Post::default()), true).unwrap(),
        vec![
            r#"CREATE TABLE IF NOT EXISTS "post" ( "id" bigserial PRIMARY KEY, "author_id" bigint, "content" text, FOREIGN KEY ("author_id") REFERENCES "user" ("id") ON DELETE CASCADE )"#
        ]
    );
}

#[test]
fn test_type_mapping_per_dialect() {
    let typed = model(Typed::default());
    assert_eq!(
        Postgres::new().create_table_sql(&typed, false).unwrap(),
        vec![
            r#"CREATE TABLE "typed" ( "id" bigserial PRIMARY KEY, "name" varchar(128), "state" bigint NOT NULL DEFAULT 0, "body" text, "active" boolean, "ratio" double precision, "payload" bytea, "seen" timestamp with time zone )"#
        ]
    );
    assert_eq!(
        Mysql::new().create_table_sql(&typed, false).unwrap(),
        vec![
            "CREATE TABLE `typed` ( `id` bigint PRIMARY KEY AUTO_INCREMENT, `name` varchar(128), `state` bigint NOT NULL DEFAULT 0, `body` longtext, `active` boolean, `ratio` double, `payload` longblob, `seen` timestamp )"
        ]
    );
    assert_eq!(
        Sqlite::new().create_table_sql(&typed, false).unwrap(),
        vec![
            "CREATE TABLE `typed` ( `id` integer PRIMARY KEY AUTOINCREMENT NOT NULL, `name` text, `state` integer NOT NULL DEFAULT 0, `body` text, `active` integer, `ratio` real, `payload` blob, `seen` text )"
        ]
    );
    assert_eq!(
        Oracle::new().create_table_sql(&typed, false).unwrap()[0],
        r#"CREATE TABLE "typed" ( "id" NUMBER(16) PRIMARY KEY NOT NULL, "name" VARCHAR2(128), "state" NUMBER NOT NULL DEFAULT 0, "body" CLOB, "active" NUMBER(1), "ratio" NUMBER(16,2), "payload" CLOB, "seen" DATE )"#
    );
}

#[test]
fn test_unsupported_column_type() {
    let err = Postgres::new()
        .create_table_sql(&model(Unsupported::default()), true)
        .unwrap_err();
    assert!(err.is_config());
    assert!(matches!(
        err,
        keel_sql_core::Error::UnsupportedColumnType { ref column_type, ref column, .. }
            if column_type == "jsonb" && column == "doc"
    ));
}

// =============================================================================
// INSERT / UPDATE / DELETE
// =============================================================================

#[test]
fn test_insert_postgres() {
    let d = Postgres::new();
    let (sql, args) = d.insert_sql(&Criteria::new(sql_gen(7)));
    assert_eq!(
        sql,
        r#"INSERT INTO "sql_gen_model" ("prim", "first", "last", "amount") VALUES ($1, $2, $3, $4) RETURNING "prim""#
    );
    assert_eq!(args, params![7_i64, "a", "b", 3]);

    let (sql, args) = d.insert_sql(&Criteria::new(sql_gen(0)));
    assert_eq!(
        sql,
        r#"INSERT INTO "sql_gen_model" ("first", "last", "amount") VALUES ($1, $2, $3) RETURNING "prim""#
    );
    assert_eq!(args, params!["a", "b", 3]);
}

#[test]
fn test_insert_without_returning() {
    let (sql, _) = Mysql::new().insert_sql(&Criteria::new(sql_gen(0)));
    assert_eq!(
        sql,
        "INSERT INTO `sql_gen_model` (`first`, `last`, `amount`) VALUES (?, ?, ?)"
    );

    let (sql, _) = Postgres::new().insert_sql(&Criteria::new(model(WithoutPk::default())));
    assert_eq!(
        sql,
        r#"INSERT INTO "without_pk" ("first", "last", "amount") VALUES ($1, $2, $3)"#
    );
}

#[test]
fn test_update_by_pk() {
    let d = Postgres::new();
    let (sql, args) = d.update_sql(&by_pk(sql_gen(7), &d));
    assert_eq!(
        sql,
        r#"UPDATE "sql_gen_model" SET "first" = $1, "last" = $2, "amount" = $3 WHERE "prim" = $4"#
    );
    assert_eq!(args, params!["a", "b", 3, 7_i64]);

    let d = Sqlite::new();
    let (sql, _) = d.update_sql(&by_pk(sql_gen(7), &d));
    assert_eq!(
        sql,
        "UPDATE `sql_gen_model` SET `first` = ?, `last` = ?, `amount` = ? WHERE `prim` = ?"
    );
}

#[test]
fn test_delete_by_pk() {
    let d = Postgres::new();
    let (sql, args) = d.delete_sql(&by_pk(sql_gen(7), &d));
    assert_eq!(sql, r#"DELETE FROM "sql_gen_model" WHERE "prim" = $1"#);
    assert_eq!(args, params![7_i64]);

    let d = Oracle::new();
    let (sql, _) = d.delete_sql(&by_pk(sql_gen(7), &d));
    assert_eq!(sql, r#"DELETE FROM "sql_gen_model" WHERE "prim" = $1"#);
}

#[test]
fn test_delete_with_user_condition() {
    let d = Mysql::new();
    let mut criteria = Criteria::new(sql_gen(7));
    criteria.condition = Some(Condition::new("amount > ?", params![2]));
    criteria.merge_pk_condition(&d, false);
    let (sql, args) = d.delete_sql(&criteria);
    assert_eq!(sql, "DELETE FROM `sql_gen_model` WHERE (`prim` = ?) AND (amount > ?)");
    assert_eq!(args, params![7_i64, 2]);
}

// =============================================================================
// SELECT
// =============================================================================

#[test]
fn test_select_with_join() {
    let d = Postgres::new();
    let (sql, args) = d.query_sql(&Criteria::new(model(Post::default())));
    assert_eq!(
        sql,
        r#"SELECT "post"."id", "post"."author_id", "post"."content", "author"."id" AS author___id, "author"."name" AS author___name FROM "post" LEFT JOIN "user" AS "author" ON "post"."author_id" = "author"."id""#
    );
    assert!(args.is_empty());
}

#[test]
fn test_select_with_join_by_pk() {
    let d = Sqlite::new();
    let mut criteria = Criteria::new(model(Post {
        id: 3,
        ..Post::default()
    }));
    criteria.merge_pk_condition(&d, true);
    let (sql, args) = d.query_sql(&criteria);
    assert_eq!(
        sql,
        "SELECT `post`.`id`, `post`.`author_id`, `post`.`content`, `author`.`id` AS author___id, `author`.`name` AS author___name FROM `post` LEFT JOIN `user` AS `author` ON `post`.`author_id` = `author`.`id` WHERE `post`.`id` = ?"
    );
    assert_eq!(args, params![3_i64]);
}

#[test]
fn test_select_omit_join() {
    let d = Postgres::new();
    let mut criteria = Criteria::new(model(Post::default()));
    criteria.omit_join = true;
    let (sql, _) = d.query_sql(&criteria);
    assert_eq!(sql, r#"SELECT "id", "author_id", "content" FROM "post""#);
}

#[test]
fn test_select_condition_order_and_paging() {
    let d = Postgres::new();
    let score = Condition::new("score <= ?", params![60]).or("score >= ?", params![80]);
    let mut criteria = Criteria::new(model(Student::default()));
    criteria.condition = Some(Condition::in_list("grade", params![6, 7, 8]).and_condition(score));
    criteria.order_bys = vec![
        OrderBy {
            path: "name".into(),
            descending: false,
        },
        OrderBy {
            path: "grade".into(),
            descending: true,
        },
    ];
    criteria.limit = Some(10);
    criteria.offset = Some(20);

    let (sql, args) = d.query_sql(&criteria);
    assert_eq!(
        sql,
        r#"SELECT "id", "name", "grade", "score" FROM "student" WHERE (grade IN ($1, $2, $3)) AND ((score <= $4) OR (score >= $5)) ORDER BY "name", "grade" DESC LIMIT $6 OFFSET $7"#
    );
    assert_eq!(args, params![6, 7, 8, 60, 80, 10_i64, 20_i64]);
}

#[test]
fn test_select_paging_mysql_and_oracle() {
    let mut criteria = Criteria::new(model(Student::default()));
    criteria.limit = Some(5);
    criteria.offset = Some(15);

    let (sql, args) = Mysql::new().query_sql(&criteria);
    assert_eq!(
        sql,
        "SELECT `id`, `name`, `grade`, `score` FROM `student` LIMIT ? OFFSET ?"
    );
    assert_eq!(args, params![5_i64, 15_i64]);

    let (sql, args) = Oracle::new().query_sql(&criteria);
    assert_eq!(
        sql,
        r#"SELECT "id", "name", "grade", "score" FROM "student" OFFSET $1 ROWS FETCH NEXT $2 ROWS ONLY"#
    );
    assert_eq!(args, params![15_i64, 5_i64]);
}

#[test]
fn test_select_omitted_fields() {
    let mut student = Student::default();
    let model = Extractor::default()
        .extract(&mut student, true, &["score".to_string()])
        .unwrap();
    let (sql, _) = Mysql::new().query_sql(&Criteria::new(model));
    assert_eq!(sql, "SELECT `id`, `name`, `grade` FROM `student`");
}

// =============================================================================
// DDL helpers
// =============================================================================

#[derive(Debug, Default, Record)]
#[table(name = "a")]
struct Altered {
    id: i64,
    #[column("size:100")]
    c: String,
}

#[test]
fn test_add_column() {
    let model = model(Altered::default());
    let field = model.field("c").unwrap();
    assert_eq!(
        Postgres::new().add_column_sql(&model.table, field).unwrap(),
        r#"ALTER TABLE "a" ADD COLUMN "c" varchar(100)"#
    );
    assert_eq!(
        Mysql::new().add_column_sql(&model.table, field).unwrap(),
        "ALTER TABLE `a` ADD COLUMN `c` varchar(100)"
    );
    assert_eq!(
        Oracle::new().add_column_sql(&model.table, field).unwrap(),
        r#"ALTER TABLE "a" ADD COLUMN "c" VARCHAR2(100)"#
    );
}

#[test]
fn test_create_index() {
    let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    assert_eq!(
        Postgres::new().create_index_sql("iname", "itable", true, &columns),
        r#"CREATE UNIQUE INDEX "iname" ON "itable" ("a", "b", "c")"#
    );
    assert_eq!(
        Sqlite::new().create_index_sql("iname", "itable", false, &columns[..1]),
        "CREATE INDEX `iname` ON `itable` (`a`)"
    );
}

#[test]
fn test_drop_table() {
    assert_eq!(Postgres::new().drop_table_sql("post"), r#"DROP TABLE IF EXISTS "post""#);
    assert_eq!(Mysql::new().drop_table_sql("post"), "DROP TABLE IF EXISTS `post`");
    assert_eq!(Oracle::new().drop_table_sql("post"), r#"DROP TABLE "post""#);
}
