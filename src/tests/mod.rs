mod test_utils;

mod jacobian_fk_agreement;
