// Mirrors the DDL in `postgres::CREATE_FOREX_TABLE`.
diesel::table! {
    forex_data (id) {
        id -> Int4,
        #[max_length = 10]
        currency_pair -> Varchar,
        exchange_rate -> Numeric,
        #[sql_name = "timestamp"]
        observed_at -> Text,
    }
}
