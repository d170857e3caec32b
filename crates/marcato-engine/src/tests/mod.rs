mod dbm_props;
