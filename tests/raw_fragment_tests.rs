mod common;

use common::{ids, seeded};
use jsoncolumn::fixtures::IceCream;
use jsoncolumn::{DbError, OrderBy, Value};

#[tokio::test]
async fn test_bare_predicate_fragment() -> anyhow::Result<()> {
    let h = seeded().await?;

    let red = h
        .session
        .query_raw::<IceCream>(
            "json_contains(`FoodAdditives`, json_quote(?), '$')",
            vec![Value::from("E124")],
            OrderBy::desc("Id"),
        )
        .await?;
    assert_eq!(ids(&red), vec![3, 2]);
    Ok(())
}

#[tokio::test]
async fn test_fragment_order_by_wins() -> anyhow::Result<()> {
    let h = seeded().await?;

    let result = h
        .session
        .query_raw::<IceCream>(
            "SELECT * FROM IceCreams WHERE json_unquote(json_extract(`Properties`, '$.InStock')) = ? ORDER BY Name",
            vec![Value::from("true")],
            OrderBy::identity(),
        )
        .await?;
    assert_eq!(ids(&result), vec![2, 1]);
    Ok(())
}

#[tokio::test]
async fn test_parameters_are_never_interpolated() -> anyhow::Result<()> {
    let h = seeded().await?;

    let result = h
        .session
        .query_raw::<IceCream>(
            "`Name` = ?",
            vec![Value::from("Vanilla' OR '1' = '1")],
            OrderBy::identity(),
        )
        .await?;
    assert!(result.is_empty());

    let search = h
        .session
        .query_raw::<IceCream>(
            "json_search(`AllSupplierInformations`, 'one', ?, NULL, '$[*].Name') is not null and `Id` > ?",
            vec![Value::from("F%"), Value::from(1)],
            OrderBy::identity(),
        )
        .await?;
    assert_eq!(ids(&search), vec![3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_fragments_are_storage_errors() -> anyhow::Result<()> {
    let h = seeded().await?;

    let cases: [(&str, Vec<Value>); 4] = [
        ("json_contains(`FoodAdditives`,", vec![]),
        ("`Name` = ?", vec![]),
        ("select * from `Other` where `Id` = 1", vec![]),
        ("select `Name` from `IceCreams`", vec![]),
    ];
    for (fragment, params) in cases {
        let err = h
            .session
            .query_raw::<IceCream>(fragment, params, OrderBy::identity())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageError(_)), "{fragment}: {err}");
    }
    Ok(())
}
