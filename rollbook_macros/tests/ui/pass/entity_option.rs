use rollbook_core::{Fetchable, Identifiable, Insertable, ParamValue, Schema};
use rollbook_macros::Entity;

#[derive(Entity, Clone, Debug, PartialEq)]
struct Article {
    #[fetch(id)]
    id: Option<i64>,
    #[fetch(column = "headline")]
    title: String,
    subtitle: Option<String>,
    views: Option<i32>,
    #[fetch(skip)]
    scratch: Vec<u8>,
}

fn main() {
    // Table name is the pluralized snake case of the struct name.
    assert_eq!(Article::TABLE, "articles");
    assert_eq!(Article::SELECT_COLUMNS, &["id", "headline", "subtitle", "views"]);
    assert!(Article::column("subtitle").unwrap().nullable);
    assert!(!Article::column("headline").unwrap().nullable);

    let a = Article {
        id: Some(5),
        title: "t".into(),
        subtitle: None,
        views: Some(3),
        scratch: Vec::new(),
    };
    let id: Option<<Article as Identifiable>::Key> = a.id();
    assert_eq!(id, Some(5));
    assert_eq!(
        a.insert_values(),
        vec![ParamValue::String("t".into()), ParamValue::Null, ParamValue::I32(3)]
    );
}
