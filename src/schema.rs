table! {
    turfs (id) {
        id -> Int8,
        name -> Varchar,
        owner_id -> Int8,
        open_time -> Time,
        close_time -> Time,
        slot_minutes -> Int2,
        net_count -> Int2,
        base_price -> Int8,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    tariffs (id) {
        id -> Int8,
        turf_id -> Int8,
        label -> Varchar,
        start_time -> Time,
        end_time -> Time,
        price -> Int8,
        created_at -> Nullable<Timestamptz>,
    }
}

table! {
    slots (id) {
        id -> Int8,
        turf_id -> Int8,
        net_no -> Int2,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        price -> Int8,
        tariff_label -> Varchar,
        state -> Varchar,
        lease_holder -> Nullable<Varchar>,
        lease_expires_at -> Nullable<Timestamptz>,
        block_reason -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    bookings (id) {
        id -> Int8,
        slot_id -> Int8,
        turf_id -> Int8,
        owner_id -> Int8,
        customer_name -> Varchar,
        customer_phone -> Varchar,
        user_id -> Nullable<Int8>,
        source -> Varchar,
        payment_mode -> Varchar,
        payment_status -> Varchar,
        amount -> Int8,
        advance_amount -> Int8,
        status -> Varchar,
        cancelled_at -> Nullable<Timestamptz>,
        cancelled_by -> Nullable<Varchar>,
        cancel_reason -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

joinable!(tariffs -> turfs (turf_id));
joinable!(slots -> turfs (turf_id));
joinable!(bookings -> slots (slot_id));
joinable!(bookings -> turfs (turf_id));

allow_tables_to_appear_in_same_query!(turfs, tariffs, slots, bookings,);
